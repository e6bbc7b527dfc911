use thiserror::Error;

use crate::particle::ParticleKind;

/// Everything that can go fatally wrong in the transport core.
///
/// There is no recovery path for any of these: the physical invariants they
/// guard (population bounds, energy balance, positivity of temperature and
/// cross sections) are not things a run can continue without. Callers
/// propagate with `?` up to the driver, which aborts the run with the
/// message.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("population store over capacity: pop={pop}, capacity={capacity}")]
    CapacityExceeded { pop: usize, capacity: usize },

    #[error("index {index} out of bounds for population of {pop}")]
    IndexOutOfBounds { index: usize, pop: usize },

    #[error("population store is empty")]
    EmptyStore,

    #[error("invalid target population {target} (capacity {capacity})")]
    InvalidTarget { target: usize, capacity: usize },

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    #[error("material {index}: temperature solve produced T = {temperature}")]
    NegativeTemperature { index: usize, temperature: f64 },

    #[error("material {index}: invalid cross section {value} at T = {temperature}")]
    InvalidCrossSection {
        index: usize,
        value: f64,
        temperature: f64,
    },

    #[error("grid cell {cell}: invalid majorant {value}")]
    InvalidMajorant { cell: usize, value: f64 },

    #[error("position {position:?} resolves outside the majorant grid")]
    OutsideGrid { position: [f64; 3] },

    #[error("degenerate direction {direction:?}")]
    DegenerateDirection { direction: [f64; 3] },

    #[error("{context}: gave up after {attempts} attempts")]
    SearchExhausted { context: String, attempts: usize },

    #[error("temperature solve did not converge in {iterations} iterations (target energy density {target})")]
    SolverDiverged { iterations: usize, target: f64 },

    #[error("emitting material {index} received zero source samples")]
    SourceUndersampled { index: usize },

    #[error("unknown material index {index} (registry holds {count})")]
    UnknownMaterial { index: usize, count: usize },

    #[error("group {group} out of range for {groups}-group data")]
    GroupOutOfRange { group: usize, groups: usize },

    #[error("cannot merge particles of kind {a:?} and {b:?}")]
    KindMismatch { a: ParticleKind, b: ParticleKind },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
