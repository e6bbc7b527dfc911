// Input configuration for a simulation.
//
// Everything is plain data deserialized with serde and handed to the
// constructors that need it; there is no ambient global configuration.

use serde::Deserialize;

use crate::error::TransportResult;

fn default_alpha() -> f64 {
    1.0
}

fn default_search_n() -> usize {
    4
}

fn default_max_rejects() -> usize {
    1000
}

/// How a material couples the absorbed-energy tally back into its internal
/// energy each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CouplingMode {
    /// energy <- energy - emitted + absorbed
    #[default]
    Standard,
    /// energy <- absorbed (symmetric semi-implicit scheme)
    SemiImplicit,
}

/// Closed set of scattering laws.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "law", rename_all = "kebab-case")]
pub enum ScatterLaw {
    P0,
    P1 { mean_cosine: f64 },
}

impl Default for ScatterLaw {
    fn default() -> Self {
        ScatterLaw::P0
    }
}

/// Per-material input: opacity and heat-capacity polynomials (ascending
/// coefficients in temperature), initial state, and scheme selectors.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialConfig {
    pub number_of_groups: usize,
    /// Capture opacity polynomial in T.
    pub capture: Vec<f64>,
    /// Scattering opacity polynomial in T.
    pub scatter: Vec<f64>,
    /// Heat capacity polynomial in T.
    pub cv: Vec<f64>,
    /// Implicitness damping in [0, 1].
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    pub temperature: f64,
    pub volume: f64,
    #[serde(default)]
    pub coupling: CouplingMode,
    #[serde(default)]
    pub scatter_law: ScatterLaw,
    #[serde(default)]
    pub name: Option<String>,
}

/// Majorant grid resolution and interior-search density.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Cell count per axis.
    pub dimensions: [usize; 3],
    /// Stochastic interior-search samples per axis per cell.
    #[serde(default = "default_search_n")]
    pub search_n: usize,
}

/// Source defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub n_particles: usize,
    /// Rejection-sampling retry cap before the geometry is declared
    /// degenerate.
    #[serde(default = "default_max_rejects")]
    pub max_rejects: usize,
}

/// Whole-problem input dictionary.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub materials: Vec<MaterialConfig>,
    pub grid: GridConfig,
    pub source: SourceConfig,
}

impl SimulationConfig {
    pub fn from_json(text: &str) -> TransportResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
