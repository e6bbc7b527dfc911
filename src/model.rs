// Time-step driver: emission, delta-tracked transport, material update and
// population control, sequenced per step.

use std::sync::Arc;

use log::info;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::dungeon::{control_population, Dungeon};
use crate::error::{TransportError, TransportResult};
use crate::geometry::GeometryModel;
use crate::grid::MajorantGrid;
use crate::material::LIGHT_SPEED;
use crate::materials::MaterialRegistry;
use crate::particle::ParticleRecord;
use crate::rng::McRng;
use crate::settings::Settings;
use crate::source::EmissionSource;
use crate::tally::EnergyTally;

const DEFAULT_SEED: u64 = 1;
/// Decorrelates the grid-construction stream from the transport stream.
const GRID_SEED_SALT: u64 = 0x9e3779b97f4a7c15;

/// Event cap per particle history; a history that outlives it indicates a
/// degenerate opacity/step configuration.
const MAX_HISTORY_EVENTS: usize = 1_000_000;

/// What ended one particle history within a step.
enum Outcome {
    Absorbed,
    Census,
    Leaked(f64),
}

/// Per-step accounting reported back to the caller.
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub step: usize,
    /// Problem time at the end of the step, shakes.
    pub time: f64,
    pub emitted: f64,
    pub absorbed: f64,
    pub leaked: f64,
    pub census_population: usize,
    pub temperatures: Vec<f64>,
}

/// Couples the collaborators into the per-step sequence: set dt, refresh
/// majorants, emit, transport, update materials, control the census
/// population.
pub struct Model<G> {
    pub geometry: Arc<G>,
    pub registry: MaterialRegistry,
    pub source: EmissionSource<G>,
    pub grid: MajorantGrid,
    pub settings: Settings,
    census: Dungeon,
}

impl<G: GeometryModel> Model<G> {
    pub fn from_config(
        geometry: Arc<G>,
        config: &SimulationConfig,
        settings: Settings,
    ) -> TransportResult<Self> {
        settings.validate()?;
        let registry = MaterialRegistry::from_configs(&config.materials)?;
        let seed = settings.seed.unwrap_or(DEFAULT_SEED);
        let mut grid_rng = McRng::new(seed ^ GRID_SEED_SALT);
        let grid = MajorantGrid::new(&config.grid, geometry.as_ref(), &mut grid_rng)?;
        let source = EmissionSource::new(Arc::clone(&geometry), config.source.max_rejects)?;
        let census = Dungeon::new(settings.max_population)?;
        Ok(Self {
            geometry,
            registry,
            source,
            grid,
            settings,
            census,
        })
    }

    pub fn census(&self) -> &Dungeon {
        &self.census
    }

    /// Run all configured steps and return one summary per step.
    pub fn run(&mut self) -> TransportResult<Vec<StepSummary>> {
        self.settings.validate()?;
        let mut rng = McRng::new(self.settings.seed.unwrap_or(DEFAULT_SEED));
        let mut summaries = Vec::with_capacity(self.settings.steps);
        let mut time = 0.0;
        for step in 0..self.settings.steps {
            let summary = self.run_step(step, time, &mut rng)?;
            time = summary.time;
            info!(
                "step {}: emitted {:.4e}, absorbed {:.4e}, leaked {:.4e}, census {}",
                step, summary.emitted, summary.absorbed, summary.leaked, summary.census_population
            );
            summaries.push(summary);
        }
        Ok(summaries)
    }

    fn run_step<R: Rng + ?Sized>(
        &mut self,
        step: usize,
        t_start: f64,
        rng: &mut R,
    ) -> TransportResult<StepSummary> {
        let dt = self.settings.dt;
        self.registry.set_time_step(dt)?;
        self.grid.update(&self.registry)?;

        let emitted: f64 = self.registry.iter().map(|m| m.emitted_radiation()).sum();

        // Prior census continues this step alongside the fresh emission.
        let mut fresh = Dungeon::new(self.census.capacity())?;
        fresh.k_eff = self.census.k_eff;
        fresh.set_merge_radius(self.census.merge_radius())?;
        let mut incoming = std::mem::replace(&mut self.census, fresh);
        self.source
            .append_imc(&mut incoming, &self.registry, self.settings.particles, rng)?;

        let t_end = t_start + dt;
        let mut tally = EnergyTally::new("absorption", self.registry.len());
        let mut leaked = 0.0;
        while !incoming.is_empty() {
            let mut particle = incoming.release()?;
            particle.time = particle.time.max(t_start);
            let outcome = transport_particle(
                self.geometry.as_ref(),
                &self.registry,
                &self.grid,
                &mut particle,
                t_end,
                &mut tally,
                &mut self.census,
                rng,
            )?;
            if let Outcome::Leaked(weight) = outcome {
                leaked += weight;
            }
        }

        self.registry.update_all(tally.absorbed())?;
        control_population(&mut self.census, self.settings.region_cap, |r| r.mat_index)?;

        Ok(StepSummary {
            step,
            time: t_end,
            emitted,
            absorbed: tally.total(),
            leaked,
            census_population: self.census.len(),
            temperatures: self.registry.iter().map(|m| m.temperature()).collect(),
        })
    }
}

/// Delta-tracked flight of one particle until absorption, census, or
/// leakage. Virtual collisions keep the sampled free path exact against
/// the per-cell majorant.
#[allow(clippy::too_many_arguments)]
fn transport_particle<G: GeometryModel, R: Rng + ?Sized>(
    geometry: &G,
    registry: &MaterialRegistry,
    grid: &MajorantGrid,
    particle: &mut ParticleRecord,
    t_end: f64,
    tally: &mut EnergyTally,
    census: &mut Dungeon,
    rng: &mut R,
) -> TransportResult<Outcome> {
    if !particle.has_unit_direction() {
        return Err(TransportError::DegenerateDirection {
            direction: particle.direction,
        });
    }
    let bounds = geometry.bounds();
    for _ in 0..MAX_HISTORY_EVENTS {
        let remaining = t_end - particle.time;
        if remaining <= 0.0 {
            particle.time = t_end;
            census.detain(particle.clone())?;
            return Ok(Outcome::Census);
        }
        let d_census = LIGHT_SPEED * remaining;
        let majorant = grid.value_at(particle.position, particle.direction)?;
        let d_boundary = grid.distance_to_boundary(particle.position, particle.direction)?;
        let d_collision = if majorant > 0.0 {
            -(1.0 - rng.gen::<f64>()).ln() / majorant
        } else {
            f64::INFINITY
        };

        if d_census <= d_boundary && d_census <= d_collision {
            particle.move_by(d_census);
            particle.time = t_end;
            census.detain(particle.clone())?;
            return Ok(Outcome::Census);
        }

        if d_boundary < d_collision {
            particle.move_by(d_boundary);
            particle.time += d_boundary / LIGHT_SPEED;
            if !bounds.contains(particle.position) {
                particle.alive = false;
                return Ok(Outcome::Leaked(particle.weight));
            }
            continue;
        }

        particle.move_by(d_collision);
        particle.time += d_collision / LIGHT_SPEED;
        let Some(hit) = geometry.material_at(particle.position) else {
            // Void pocket under a non-void majorant cell: virtual collision.
            continue;
        };
        let material = registry.get(hit.mat_index)?;
        material.check_group(particle.group)?;
        let total = material.total_xs();
        if rng.gen::<f64>() * majorant > total {
            continue; // virtual collision
        }
        particle.mat_index = hit.mat_index;
        particle.cell_id = hit.cell_id;
        if rng.gen::<f64>() * total < material.effective_absorption() {
            tally.score(hit.mat_index, particle.weight)?;
            particle.alive = false;
            return Ok(Outcome::Absorbed);
        }
        particle.direction = material.sample_scattered_direction(particle.direction, rng);
    }
    Err(TransportError::SearchExhausted {
        context: "particle history event loop".into(),
        attempts: MAX_HISTORY_EVENTS,
    })
}
