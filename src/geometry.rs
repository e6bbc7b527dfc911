// Narrow geometry contract consumed by the transport core.
//
// The full cell/universe hierarchy and surface tracking live outside this
// crate; the core only ever asks "what material is at this point" and "how
// big is the domain".

use std::collections::HashSet;

use crate::bounding_box::BoundingBox;
use crate::error::{TransportError, TransportResult};
use crate::particle::ParticleRecord;

/// Result of a point-location query: which material region, and the unique
/// id of the geometry cell that answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialLookup {
    pub mat_index: usize,
    pub cell_id: u64,
}

/// The geometry collaborator contract.
///
/// `material_at` returns `None` for void regions and for points outside the
/// domain; callers decide whether that is a rejection (source sampling) or a
/// leak (transport).
pub trait GeometryModel: Send + Sync {
    fn bounds(&self) -> BoundingBox;

    fn material_at(&self, position: [f64; 3]) -> Option<MaterialLookup>;

    /// Resolve a record's material index and cell id after a raw position
    /// assignment. Errors if the position lands in void or outside.
    fn place(&self, record: &mut ParticleRecord) -> TransportResult<()> {
        match self.material_at(record.position) {
            Some(hit) => {
                record.mat_index = hit.mat_index;
                record.cell_id = hit.cell_id;
                Ok(())
            }
            None => Err(TransportError::OutsideGrid {
                position: record.position,
            }),
        }
    }
}

/// One axis-aligned homogeneous region.
#[derive(Debug, Clone)]
pub struct Brick {
    pub lower: [f64; 3],
    pub upper: [f64; 3],
    pub mat_index: usize,
    pub cell_id: u64,
}

impl Brick {
    pub fn new(lower: [f64; 3], upper: [f64; 3], mat_index: usize, cell_id: u64) -> Self {
        Self {
            lower,
            upper,
            mat_index,
            cell_id,
        }
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|a| p[a] >= self.lower[a] && p[a] <= self.upper[a])
    }

    pub fn volume(&self) -> f64 {
        (0..3).map(|a| self.upper[a] - self.lower[a]).product()
    }
}

/// Minimal geometry implementation: a list of axis-aligned bricks, first
/// match wins. Points matching no brick are void.
///
/// This is enough for tests, demos and the grid's interior search; anything
/// richer is expected to come from an external geometry crate implementing
/// [`GeometryModel`].
#[derive(Debug, Clone)]
pub struct BrickGeometry {
    bricks: Vec<Brick>,
    bounds: BoundingBox,
}

impl BrickGeometry {
    /// Build from a non-empty brick list. Cell ids must be unique; the
    /// domain bounding box is the hull of all bricks.
    pub fn new(bricks: Vec<Brick>) -> TransportResult<Self> {
        if bricks.is_empty() {
            return Err(TransportError::InvalidConfig(
                "geometry needs at least one brick".into(),
            ));
        }
        let mut seen = HashSet::new();
        for brick in &bricks {
            if !seen.insert(brick.cell_id) {
                return Err(TransportError::InvalidConfig(format!(
                    "duplicate cell_id {} in geometry",
                    brick.cell_id
                )));
            }
            for a in 0..3 {
                if brick.upper[a] <= brick.lower[a] {
                    return Err(TransportError::InvalidConfig(format!(
                        "brick {} has non-positive extent on axis {}",
                        brick.cell_id, a
                    )));
                }
            }
        }
        let mut lo = bricks[0].lower;
        let mut hi = bricks[0].upper;
        for brick in &bricks[1..] {
            for a in 0..3 {
                lo[a] = lo[a].min(brick.lower[a]);
                hi[a] = hi[a].max(brick.upper[a]);
            }
        }
        Ok(Self {
            bricks,
            bounds: BoundingBox::new(lo, hi),
        })
    }

    /// Single homogeneous box filling the whole domain.
    pub fn single(lower: [f64; 3], upper: [f64; 3], mat_index: usize) -> TransportResult<Self> {
        Self::new(vec![Brick::new(lower, upper, mat_index, 1)])
    }

    pub fn bricks(&self) -> &[Brick] {
        &self.bricks
    }
}

impl GeometryModel for BrickGeometry {
    fn bounds(&self) -> BoundingBox {
        self.bounds.clone()
    }

    fn material_at(&self, position: [f64; 3]) -> Option<MaterialLookup> {
        self.bricks
            .iter()
            .find(|b| b.contains(position))
            .map(|b| MaterialLookup {
                mat_index: b.mat_index,
                cell_id: b.cell_id,
            })
    }
}
