// Coarse spatial majorant grid for delta-tracking.
//
// The cell-to-material mapping is built once from a stochastic interior
// search; only the per-cell majorant values are refreshed as opacities
// change with temperature.

use log::debug;
use rand::Rng;
use rayon::prelude::*;

use crate::config::GridConfig;
use crate::error::{TransportError, TransportResult};
use crate::geometry::GeometryModel;
use crate::materials::MaterialRegistry;

/// Tolerance band around cell faces; positions this close to a face are
/// attributed to the cell the flight direction is entering.
const SURFACE_TOL: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct MajorantGrid {
    corner: [f64; 3],
    pitch: [f64; 3],
    dims: [usize; 3],
    /// Distinct material indices observed in each cell, flattened x-fastest.
    cell_mats: Vec<Vec<usize>>,
    majorants: Vec<f64>,
}

impl MajorantGrid {
    /// Partition the geometry bounding box into `dimensions` cells and run
    /// the stochastic interior search: `search_n`^3 stratified samples per
    /// cell, recording every distinct material the geometry reports.
    pub fn new<G: GeometryModel, R: Rng + ?Sized>(
        cfg: &GridConfig,
        geometry: &G,
        rng: &mut R,
    ) -> TransportResult<Self> {
        if cfg.dimensions.iter().any(|&d| d == 0) {
            return Err(TransportError::InvalidConfig(format!(
                "grid dimensions must all be >= 1, got {:?}",
                cfg.dimensions
            )));
        }
        if cfg.search_n == 0 {
            return Err(TransportError::InvalidConfig(
                "grid search_n must be >= 1".into(),
            ));
        }
        let bounds = geometry.bounds();
        let mut pitch = [0.0; 3];
        for a in 0..3 {
            if bounds.width[a] <= 0.0 {
                return Err(TransportError::InvalidConfig(format!(
                    "geometry bounding box is degenerate on axis {}",
                    a
                )));
            }
            pitch[a] = bounds.width[a] / cfg.dimensions[a] as f64;
        }

        let n_cells = cfg.dimensions.iter().product();
        let mut cell_mats = Vec::with_capacity(n_cells);
        let sub = 1.0 / cfg.search_n as f64;
        for iz in 0..cfg.dimensions[2] {
            for iy in 0..cfg.dimensions[1] {
                for ix in 0..cfg.dimensions[0] {
                    let lo = [
                        bounds.lower_left[0] + ix as f64 * pitch[0],
                        bounds.lower_left[1] + iy as f64 * pitch[1],
                        bounds.lower_left[2] + iz as f64 * pitch[2],
                    ];
                    let mut mats: Vec<usize> = Vec::new();
                    for sx in 0..cfg.search_n {
                        for sy in 0..cfg.search_n {
                            for sz in 0..cfg.search_n {
                                let p = [
                                    lo[0] + (sx as f64 + rng.gen::<f64>()) * sub * pitch[0],
                                    lo[1] + (sy as f64 + rng.gen::<f64>()) * sub * pitch[1],
                                    lo[2] + (sz as f64 + rng.gen::<f64>()) * sub * pitch[2],
                                ];
                                if let Some(hit) = geometry.material_at(p) {
                                    if !mats.contains(&hit.mat_index) {
                                        mats.push(hit.mat_index);
                                    }
                                }
                            }
                        }
                    }
                    mats.sort_unstable();
                    cell_mats.push(mats);
                }
            }
        }
        debug!(
            "majorant grid: {:?} cells, pitch {:?}, {} search points per cell",
            cfg.dimensions,
            pitch,
            cfg.search_n.pow(3)
        );
        Ok(Self {
            corner: bounds.lower_left,
            pitch,
            dims: cfg.dimensions,
            cell_mats,
            majorants: vec![0.0; n_cells],
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Recompute every cell's majorant as the max total cross-section over
    /// its resident materials. Parallel across cells: each cell writes only
    /// its own value against the read-only material state.
    pub fn update(&mut self, registry: &MaterialRegistry) -> TransportResult<()> {
        let majorants = self
            .cell_mats
            .par_iter()
            .enumerate()
            .map(|(cell, mats)| {
                let mut majorant: f64 = 0.0;
                for &m in mats {
                    majorant = majorant.max(registry.get(m)?.total_xs());
                }
                // Void-only cells legitimately carry zero; a cell with
                // materials must end up positive and finite.
                if !mats.is_empty() && !(majorant > 0.0 && majorant.is_finite()) {
                    return Err(TransportError::InvalidMajorant {
                        cell,
                        value: majorant,
                    });
                }
                Ok(majorant)
            })
            .collect::<TransportResult<Vec<f64>>>()?;
        self.majorants = majorants;
        Ok(())
    }

    /// Cell coordinates containing `position`, nudged across a face when
    /// the position sits within the surface tolerance of it and the
    /// direction crosses it.
    fn cell_of(&self, position: [f64; 3], direction: [f64; 3]) -> TransportResult<[usize; 3]> {
        let mut cell = [0usize; 3];
        for a in 0..3 {
            let rel = position[a] - self.corner[a];
            let mut i = (rel / self.pitch[a]).floor() as i64;
            let lower = i as f64 * self.pitch[a];
            let upper = (i + 1) as f64 * self.pitch[a];
            if rel - lower < SURFACE_TOL && direction[a] < 0.0 {
                i -= 1;
            } else if upper - rel < SURFACE_TOL && direction[a] > 0.0 {
                i += 1;
            }
            if i < 0 || i >= self.dims[a] as i64 {
                return Err(TransportError::OutsideGrid { position });
            }
            cell[a] = i as usize;
        }
        Ok(cell)
    }

    #[inline]
    fn flat(&self, cell: [usize; 3]) -> usize {
        (cell[2] * self.dims[1] + cell[1]) * self.dims[0] + cell[0]
    }

    /// Majorant for the grid cell containing `position`.
    pub fn value_at(&self, position: [f64; 3], direction: [f64; 3]) -> TransportResult<f64> {
        let cell = self.cell_of(position, direction)?;
        Ok(self.majorants[self.flat(cell)])
    }

    /// Distance to the nearest cell face along `direction`, plus a
    /// tolerance margin so the face is actually crossed.
    pub fn distance_to_boundary(
        &self,
        position: [f64; 3],
        direction: [f64; 3],
    ) -> TransportResult<f64> {
        if direction.iter().all(|d| d.abs() < 1e-14) {
            return Err(TransportError::DegenerateDirection { direction });
        }
        let cell = self.cell_of(position, direction)?;
        let mut nearest = f64::INFINITY;
        for a in 0..3 {
            if direction[a] == 0.0 {
                continue;
            }
            let face_index = if direction[a] > 0.0 {
                cell[a] + 1
            } else {
                cell[a]
            };
            let plane = self.corner[a] + face_index as f64 * self.pitch[a];
            let t = (plane - position[a]) / direction[a];
            // Nudged cells can put the current face fractionally behind us.
            if t > -SURFACE_TOL && t < nearest {
                nearest = t;
            }
        }
        Ok(nearest.max(0.0) + SURFACE_TOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CouplingMode, MaterialConfig, ScatterLaw};
    use crate::geometry::{Brick, BrickGeometry};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn material(capture: f64) -> MaterialConfig {
        MaterialConfig {
            number_of_groups: 1,
            capture: vec![capture],
            scatter: vec![0.0],
            cv: vec![1.0],
            alpha: 1.0,
            temperature: 1.0,
            volume: 1.0,
            coupling: CouplingMode::Standard,
            scatter_law: ScatterLaw::P0,
            name: None,
        }
    }

    fn grid_config(dims: [usize; 3]) -> GridConfig {
        GridConfig {
            dimensions: dims,
            search_n: 3,
        }
    }

    #[test]
    fn test_single_material_uniform_majorant() {
        let geometry = BrickGeometry::single([0.0; 3], [2.0; 3], 0).unwrap();
        let registry = MaterialRegistry::from_configs(&[material(3.5)]).unwrap();
        let mut rng = StdRng::seed_from_u64(50);
        for dims in [[1, 1, 1], [2, 3, 4], [5, 5, 5]] {
            let mut grid = MajorantGrid::new(&grid_config(dims), &geometry, &mut rng).unwrap();
            grid.update(&registry).unwrap();
            for p in [[0.1, 0.1, 0.1], [1.0, 1.0, 1.0], [1.9, 0.3, 1.2]] {
                let v = grid.value_at(p, [0.0, 0.0, 1.0]).unwrap();
                assert_eq!(v, 3.5, "dims {:?} point {:?}", dims, p);
            }
        }
    }

    #[test]
    fn test_two_region_majorants() {
        // Left brick sigma 1, right brick sigma 5, face at x = 1.
        let geometry = BrickGeometry::new(vec![
            Brick::new([0.0; 3], [1.0; 3], 0, 1),
            Brick::new([1.0, 0.0, 0.0], [2.0, 1.0, 1.0], 1, 2),
        ])
        .unwrap();
        let registry = MaterialRegistry::from_configs(&[material(1.0), material(5.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(51);
        let mut grid =
            MajorantGrid::new(&grid_config([2, 1, 1]), &geometry, &mut rng).unwrap();
        grid.update(&registry).unwrap();
        assert_eq!(grid.value_at([0.5, 0.5, 0.5], [0.0, 0.0, 1.0]).unwrap(), 1.0);
        assert_eq!(grid.value_at([1.5, 0.5, 0.5], [0.0, 0.0, 1.0]).unwrap(), 5.0);
    }

    #[test]
    fn test_face_nudging_follows_direction() {
        let geometry = BrickGeometry::new(vec![
            Brick::new([0.0; 3], [1.0; 3], 0, 1),
            Brick::new([1.0, 0.0, 0.0], [2.0, 1.0, 1.0], 1, 2),
        ])
        .unwrap();
        let registry = MaterialRegistry::from_configs(&[material(1.0), material(5.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(52);
        let mut grid =
            MajorantGrid::new(&grid_config([2, 1, 1]), &geometry, &mut rng).unwrap();
        grid.update(&registry).unwrap();
        // Exactly on the interior face: the entered cell decides.
        let on_face = [1.0, 0.5, 0.5];
        assert_eq!(grid.value_at(on_face, [1.0, 0.0, 0.0]).unwrap(), 5.0);
        assert_eq!(grid.value_at(on_face, [-1.0, 0.0, 0.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_outside_grid_is_fatal() {
        let geometry = BrickGeometry::single([0.0; 3], [1.0; 3], 0).unwrap();
        let mut rng = StdRng::seed_from_u64(53);
        let grid = MajorantGrid::new(&grid_config([2, 2, 2]), &geometry, &mut rng).unwrap();
        assert!(matches!(
            grid.value_at([5.0, 0.5, 0.5], [0.0, 0.0, 1.0]),
            Err(TransportError::OutsideGrid { .. })
        ));
        // Outward direction at the domain face is also outside.
        assert!(grid.value_at([1.0, 0.5, 0.5], [1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_distance_to_boundary_crosses_face() {
        let geometry = BrickGeometry::single([0.0; 3], [2.0; 3], 0).unwrap();
        let mut rng = StdRng::seed_from_u64(54);
        let grid = MajorantGrid::new(&grid_config([2, 2, 2]), &geometry, &mut rng).unwrap();
        // From the center of the first cell heading +x, the face is at 1.0.
        let d = grid
            .distance_to_boundary([0.5, 0.5, 0.5], [1.0, 0.0, 0.0])
            .unwrap();
        assert!((d - 0.5).abs() < 1e-6);
        // Moving that far lands strictly past the face.
        assert!(0.5 + d > 1.0);
        // Oblique direction picks the nearest face.
        let s = 1.0 / 2f64.sqrt();
        let d = grid
            .distance_to_boundary([0.9, 0.5, 0.5], [s, s, 0.0])
            .unwrap();
        assert!((d - 0.1 / s).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_direction_rejected() {
        let geometry = BrickGeometry::single([0.0; 3], [1.0; 3], 0).unwrap();
        let mut rng = StdRng::seed_from_u64(55);
        let grid = MajorantGrid::new(&grid_config([1, 1, 1]), &geometry, &mut rng).unwrap();
        assert!(matches!(
            grid.distance_to_boundary([0.5, 0.5, 0.5], [0.0, 0.0, 0.0]),
            Err(TransportError::DegenerateDirection { .. })
        ));
    }

    #[test]
    fn test_invalid_grid_config_rejected() {
        let geometry = BrickGeometry::single([0.0; 3], [1.0; 3], 0).unwrap();
        let mut rng = StdRng::seed_from_u64(56);
        let bad_dims = GridConfig {
            dimensions: [0, 1, 1],
            search_n: 2,
        };
        assert!(MajorantGrid::new(&bad_dims, &geometry, &mut rng).is_err());
        let bad_search = GridConfig {
            dimensions: [1, 1, 1],
            search_n: 0,
        };
        assert!(MajorantGrid::new(&bad_search, &geometry, &mut rng).is_err());
    }

    #[test]
    fn test_update_tracks_material_state() {
        let geometry = BrickGeometry::single([0.0; 3], [1.0; 3], 0).unwrap();
        // Opacity rises linearly with T.
        let mut cfg = material(0.0);
        cfg.capture = vec![0.0, 1.0];
        cfg.temperature = 2.0;
        let mut registry = MaterialRegistry::from_configs(&[cfg]).unwrap();
        let mut rng = StdRng::seed_from_u64(57);
        let mut grid = MajorantGrid::new(&grid_config([2, 2, 2]), &geometry, &mut rng).unwrap();
        grid.update(&registry).unwrap();
        assert_eq!(grid.value_at([0.5; 3], [0.0, 0.0, 1.0]).unwrap(), 2.0);
        // Material cools (emits without absorbing); majorants follow on the
        // next update.
        registry.set_time_step(1.0).unwrap();
        registry.update_all(&[0.0]).unwrap();
        grid.update(&registry).unwrap();
        let v = grid.value_at([0.5; 3], [0.0, 0.0, 1.0]).unwrap();
        assert!(v < 2.0 && v > 0.0);
    }
}
