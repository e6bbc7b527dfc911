// Per-material energy balance and opacity model for implicit Monte Carlo.
//
// Units follow the usual IMC convention: cm, shakes, keV, jerks.

use log::debug;
use rand::Rng;

use crate::config::{CouplingMode, MaterialConfig, ScatterLaw};
use crate::error::{TransportError, TransportResult};
use crate::utilities::{newton_solve, poly_antiderivative, poly_eval, sample_isotropic};

/// Radiation constant a in jerks / (cm^3 keV^4).
pub const RADIATION_CONST: f64 = 0.01372;
/// Speed of light in cm / shake.
pub const LIGHT_SPEED: f64 = 299.792458;

/// Newton iteration cap for the temperature solve.
const MAX_SOLVE_ITERS: usize = 100;

/// State of one material region.
///
/// Opacities, the Fleck factor and the emission rate are all functions of
/// the current temperature; they are re-evaluated whenever the temperature
/// or the time step changes and cached in plain fields, so reads on the
/// transport hot path are free. A material is mutated exactly once per time
/// step (by [`ImcMaterial::update_mat`] / [`ImcMaterial::set_time_step`]),
/// sequenced after tallying and before the next step's sampling.
#[derive(Debug, Clone)]
pub struct ImcMaterial {
    /// Position of this material in the registry; carried for diagnostics.
    pub index: usize,
    pub name: Option<String>,
    n_groups: usize,
    temperature: f64,
    volume: f64,
    /// Accumulated internal energy, jerks.
    mat_energy: f64,
    fleck: f64,
    /// Planck-mean opacity, 1/cm.
    sigma_p: f64,
    sigma_a: f64,
    sigma_s: f64,
    capture: Vec<f64>,
    scatter: Vec<f64>,
    cv: Vec<f64>,
    /// Antiderivative of cv: energy density as a function of temperature.
    update_eqn: Vec<f64>,
    alpha: f64,
    dt: f64,
    coupling: CouplingMode,
    scatter_law: ScatterLaw,
}

impl ImcMaterial {
    pub fn from_config(index: usize, cfg: &MaterialConfig) -> TransportResult<Self> {
        if cfg.number_of_groups < 1 {
            return Err(TransportError::InvalidConfig(format!(
                "material {}: number_of_groups must be >= 1, got {}",
                index, cfg.number_of_groups
            )));
        }
        if cfg.volume <= 0.0 {
            return Err(TransportError::InvalidConfig(format!(
                "material {}: volume must be positive, got {}",
                index, cfg.volume
            )));
        }
        if cfg.temperature < 0.0 {
            return Err(TransportError::NegativeTemperature {
                index,
                temperature: cfg.temperature,
            });
        }
        if !(0.0..=1.0).contains(&cfg.alpha) {
            return Err(TransportError::InvalidConfig(format!(
                "material {}: alpha must lie in [0, 1], got {}",
                index, cfg.alpha
            )));
        }
        if let ScatterLaw::P1 { mean_cosine } = cfg.scatter_law {
            if (3.0 * mean_cosine).abs() > 1.0 {
                return Err(TransportError::InvalidConfig(format!(
                    "material {}: P1 mean cosine {} makes the angular density negative",
                    index, mean_cosine
                )));
            }
        }

        let update_eqn = poly_antiderivative(&cfg.cv);
        let mat_energy = poly_eval(&update_eqn, cfg.temperature) * cfg.volume;
        let mut mat = Self {
            index,
            name: cfg.name.clone(),
            n_groups: cfg.number_of_groups,
            temperature: cfg.temperature,
            volume: cfg.volume,
            mat_energy,
            fleck: 1.0,
            sigma_p: 0.0,
            sigma_a: 0.0,
            sigma_s: 0.0,
            capture: cfg.capture.clone(),
            scatter: cfg.scatter.clone(),
            cv: cfg.cv.clone(),
            update_eqn,
            alpha: cfg.alpha,
            dt: 0.0,
            coupling: cfg.coupling,
            scatter_law: cfg.scatter_law,
        };
        mat.evaluate_opacities()?;
        mat.update_fleck()?;
        Ok(mat)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn mat_energy(&self) -> f64 {
        self.mat_energy
    }

    pub fn fleck(&self) -> f64 {
        self.fleck
    }

    pub fn sigma_p(&self) -> f64 {
        self.sigma_p
    }

    pub fn sigma_a(&self) -> f64 {
        self.sigma_a
    }

    pub fn sigma_s(&self) -> f64 {
        self.sigma_s
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    pub fn coupling(&self) -> CouplingMode {
        self.coupling
    }

    pub fn time_step(&self) -> f64 {
        self.dt
    }

    /// Total opacity at the current temperature.
    pub fn total_xs(&self) -> f64 {
        self.sigma_a + self.sigma_s
    }

    /// Effective absorption opacity f * sigma_a: the implicit part of a
    /// collision that deposits energy.
    pub fn effective_absorption(&self) -> f64 {
        self.fleck * self.sigma_a
    }

    /// Effective scattering opacity sigma_s + (1 - f) * sigma_a: physical
    /// scattering plus the same-step re-emission channel.
    pub fn effective_scatter(&self) -> f64 {
        self.sigma_s + (1.0 - self.fleck) * self.sigma_a
    }

    /// Validate a particle's group index against this material's data.
    pub fn check_group(&self, group: usize) -> TransportResult<()> {
        if group >= self.n_groups {
            return Err(TransportError::GroupOutOfRange {
                group,
                groups: self.n_groups,
            });
        }
        Ok(())
    }

    /// Energy emitted over the current step: c dt sigma_P f a T^4 V.
    ///
    /// Requires temperature, opacities, Fleck factor and dt to be current;
    /// all of those are maintained by `update_mat` / `set_time_step`.
    pub fn emitted_radiation(&self) -> f64 {
        let u_r = RADIATION_CONST * self.temperature.powi(4);
        LIGHT_SPEED * self.dt * self.sigma_p * self.fleck * u_r * self.volume
    }

    /// Store the step length and re-derive the Fleck factor, which depends
    /// on it.
    pub fn set_time_step(&mut self, dt: f64) -> TransportResult<()> {
        if dt <= 0.0 || !dt.is_finite() {
            return Err(TransportError::InvalidConfig(format!(
                "material {}: time step must be positive and finite, got {}",
                self.index, dt
            )));
        }
        self.dt = dt;
        self.update_fleck()
    }

    /// Once-per-step energy balance update.
    ///
    /// The new internal energy is `old - emitted + absorbed` in the standard
    /// coupling, or just `absorbed` in the semi-implicit coupling. The new
    /// temperature is the root of the update equation at the new energy
    /// density, seeded from the previous temperature; opacities and the
    /// Fleck factor are then re-evaluated at the new temperature.
    pub fn update_mat(&mut self, absorbed: f64) -> TransportResult<()> {
        let emitted = self.emitted_radiation();
        self.mat_energy = match self.coupling {
            CouplingMode::Standard => self.mat_energy - emitted + absorbed,
            CouplingMode::SemiImplicit => absorbed,
        };
        let energy_density = self.mat_energy / self.volume;
        let new_t = self.temp_from_energy(energy_density)?;
        if new_t < 0.0 {
            return Err(TransportError::NegativeTemperature {
                index: self.index,
                temperature: new_t,
            });
        }
        debug!(
            "material {}: T {} -> {}, emitted {}, absorbed {}",
            self.index, self.temperature, new_t, emitted, absorbed
        );
        self.temperature = new_t;
        self.evaluate_opacities()?;
        self.update_fleck()
    }

    /// Invert the update equation: find T with `integral cv(T') dT' = e`.
    pub fn temp_from_energy(&self, energy_density: f64) -> TransportResult<f64> {
        let tol = (energy_density.abs() * 1e-10).max(1e-12);
        newton_solve(
            |t| poly_eval(&self.update_eqn, t) - energy_density,
            |t| poly_eval(&self.cv, t),
            self.temperature,
            tol,
            MAX_SOLVE_ITERS,
        )
        .ok_or(TransportError::SolverDiverged {
            iterations: MAX_SOLVE_ITERS,
            target: energy_density,
        })
    }

    fn evaluate_opacities(&mut self) -> TransportResult<()> {
        let sigma_a = poly_eval(&self.capture, self.temperature);
        let sigma_s = poly_eval(&self.scatter, self.temperature);
        for &sigma in &[sigma_a, sigma_s] {
            if sigma < 0.0 || !sigma.is_finite() {
                return Err(TransportError::InvalidCrossSection {
                    index: self.index,
                    value: sigma,
                    temperature: self.temperature,
                });
            }
        }
        if sigma_a + sigma_s <= 0.0 {
            return Err(TransportError::InvalidCrossSection {
                index: self.index,
                value: sigma_a + sigma_s,
                temperature: self.temperature,
            });
        }
        self.sigma_a = sigma_a;
        self.sigma_s = sigma_s;
        self.sigma_p = sigma_a;
        Ok(())
    }

    /// f = 1 / (1 + sigma_P c dt beta alpha) with beta = 4 a T^3 / cv(T);
    /// the semi-implicit coupling subtracts eta = a T^4 / energyDensity
    /// from beta first.
    fn update_fleck(&mut self) -> TransportResult<()> {
        let cv_t = poly_eval(&self.cv, self.temperature);
        if cv_t <= 0.0 || !cv_t.is_finite() {
            return Err(TransportError::InvalidConfig(format!(
                "material {}: heat capacity {} at T = {} is unusable",
                self.index, cv_t, self.temperature
            )));
        }
        let mut beta = 4.0 * RADIATION_CONST * self.temperature.powi(3) / cv_t;
        if self.coupling == CouplingMode::SemiImplicit {
            let energy_density = self.mat_energy / self.volume;
            if energy_density > 0.0 {
                let eta = RADIATION_CONST * self.temperature.powi(4) / energy_density;
                beta -= eta;
            }
        }
        let denom = 1.0 + self.sigma_p * LIGHT_SPEED * self.dt * beta * self.alpha;
        let fleck = 1.0 / denom;
        if !(fleck > 0.0 && fleck <= 1.0) {
            return Err(TransportError::InvalidConfig(format!(
                "material {}: Fleck factor {} outside (0, 1]",
                self.index, fleck
            )));
        }
        self.fleck = fleck;
        Ok(())
    }

    /// Sample the post-scatter flight direction according to this
    /// material's scattering law.
    pub fn sample_scattered_direction<R: Rng + ?Sized>(
        &self,
        incoming: [f64; 3],
        rng: &mut R,
    ) -> [f64; 3] {
        match self.scatter_law {
            ScatterLaw::P0 => sample_isotropic(rng),
            ScatterLaw::P1 { mean_cosine } => {
                let mu = sample_p1_cosine(mean_cosine, rng);
                crate::utilities::rotate_direction(incoming, mu, rng)
            }
        }
    }
}

/// Invert the CDF of p(mu) = (1 + 3 b mu) / 2 on [-1, 1].
fn sample_p1_cosine<R: Rng + ?Sized>(b: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    if b.abs() < 1e-10 {
        return 2.0 * u - 1.0;
    }
    let a = 0.75 * b;
    // a mu^2 + mu/2 + (1/2 - a) = u
    let disc = 0.25 - 4.0 * a * (0.5 - a - u);
    ((-0.5 + disc.sqrt()) / (2.0 * a)).clamp(-1.0, 1.0)
}
