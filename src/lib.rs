// Yet another implicit Monte Carlo: thermal radiation transport with a
// coupled material energy update.
//
// The crate centers on the per-step population management ("dungeon"),
// the per-material energy balance, the emission source, and the coarse
// majorant grid that accelerates delta-tracking.

mod bounding_box;
mod config;
mod dungeon;
mod error;
mod geometry;
mod grid;
mod material;
mod materials;
mod model;
mod particle;
mod rng;
mod settings;
mod source;
mod tally;
mod utilities;

pub use bounding_box::BoundingBox;
pub use config::{CouplingMode, GridConfig, MaterialConfig, ScatterLaw, SimulationConfig, SourceConfig};
pub use dungeon::{control_population, Dungeon, DEFAULT_MERGE_RADIUS};
pub use error::{TransportError, TransportResult};
pub use geometry::{Brick, BrickGeometry, GeometryModel, MaterialLookup};
pub use grid::MajorantGrid;
pub use material::{ImcMaterial, LIGHT_SPEED, RADIATION_CONST};
pub use materials::MaterialRegistry;
pub use model::{Model, StepSummary};
pub use particle::{ParticleKind, ParticleRecord};
pub use rng::McRng;
pub use settings::Settings;
pub use source::EmissionSource;
pub use tally::EnergyTally;
pub use utilities::{attempt, newton_solve, poly_antiderivative, poly_eval};
