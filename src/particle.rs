/// Phase-space snapshot of one particle.
///
/// Records are plain data: the population store owns them by slot, and a
/// record "dies" by being overwritten, never by a destructor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleRecord {
    pub position: [f64; 3],
    /// Unit vector within tolerance whenever the record is valid; checked by
    /// `has_unit_direction`, not enforced on every write.
    pub direction: [f64; 3],
    pub weight: f64,
    /// Energy group index into the owning material's group structure.
    pub group: usize,
    pub mat_index: usize,
    /// Unique cell id reported by the geometry at placement.
    pub cell_id: u64,
    pub kind: ParticleKind,
    pub time: f64,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    /// Transported radiation.
    Photon,
    /// Energy bound to the material (ui particles in the deposition pass).
    Material,
}

impl ParticleRecord {
    pub fn new(
        position: [f64; 3],
        direction: [f64; 3],
        weight: f64,
        group: usize,
        mat_index: usize,
    ) -> Self {
        Self {
            position,
            direction,
            weight,
            group,
            mat_index,
            cell_id: 0,
            kind: ParticleKind::Photon,
            time: 0.0,
            alive: true,
        }
    }

    /// Direction normalization check, tolerance 1e-6.
    pub fn has_unit_direction(&self) -> bool {
        let m2 = self.direction[0] * self.direction[0]
            + self.direction[1] * self.direction[1]
            + self.direction[2] * self.direction[2];
        (m2.sqrt() - 1.0).abs() < 1e-6
    }

    /// Advance the position `distance` along the current direction.
    pub fn move_by(&mut self, distance: f64) {
        self.position[0] += distance * self.direction[0];
        self.position[1] += distance * self.direction[1];
        self.position[2] += distance * self.direction[2];
    }
}

/// The sentinel state stale store slots hold: zero weight, dead.
impl Default for ParticleRecord {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
            weight: 0.0,
            group: 0,
            mat_index: 0,
            cell_id: 0,
            kind: ParticleKind::Photon,
            time: 0.0,
            alive: false,
        }
    }
}
