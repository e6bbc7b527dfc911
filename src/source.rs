// Thermal emission source: turns per-material emission energy into sampled
// particle records.

use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::dungeon::Dungeon;
use crate::error::{TransportError, TransportResult};
use crate::geometry::GeometryModel;
use crate::materials::MaterialRegistry;
use crate::particle::ParticleRecord;
use crate::utilities::{attempt, sample_isotropic};

/// Samples emission particles uniformly over the domain.
///
/// Each raw sample carries the full step emission energy of the material it
/// landed in; [`EmissionSource::append_imc`] divides by the per-material
/// sample count afterwards so the totals match the physical source term.
pub struct EmissionSource<G> {
    geometry: Arc<G>,
    /// Rejection-sampling retry cap; exhausting it means the geometry is
    /// effectively empty.
    max_rejects: usize,
}

impl<G: GeometryModel> EmissionSource<G> {
    pub fn new(geometry: Arc<G>, max_rejects: usize) -> TransportResult<Self> {
        if max_rejects == 0 {
            return Err(TransportError::InvalidConfig(
                "source needs a positive rejection cap".into(),
            ));
        }
        Ok(Self {
            geometry,
            max_rejects,
        })
    }

    /// Rejection-sample one emission particle: a uniform position in the
    /// bounding box landing in a non-void material, an isotropic direction,
    /// and the landing material's full emitted energy as weight.
    pub fn sample_particle<R: Rng + ?Sized>(
        &self,
        registry: &MaterialRegistry,
        rng: &mut R,
    ) -> TransportResult<ParticleRecord> {
        let bounds = self.geometry.bounds();
        let hit = attempt(self.max_rejects, || {
            let position = bounds.sample_uniform(rng);
            self.geometry
                .material_at(position)
                .map(|lookup| (position, lookup))
        })
        .ok_or_else(|| TransportError::SearchExhausted {
            context: "position rejection sampling over void geometry".into(),
            attempts: self.max_rejects,
        })?;
        let (position, lookup) = hit;
        let material = registry.get(lookup.mat_index)?;
        let mut record = ParticleRecord::new(
            position,
            sample_isotropic(rng),
            material.emitted_radiation(),
            0,
            lookup.mat_index,
        );
        record.cell_id = lookup.cell_id;
        Ok(record)
    }

    /// Reset the store to exactly `n` slots and fill every one by
    /// independent sampling. Existing content is discarded.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        store: &mut Dungeon,
        registry: &MaterialRegistry,
        n: usize,
        rng: &mut R,
    ) -> TransportResult<()> {
        store.set_size(n)?;
        for idx in 0..n {
            let record = self.sample_particle(registry, rng)?;
            store.replace(record, idx)?;
        }
        Ok(())
    }

    /// Sample `n` more records and push them, leaving existing content
    /// untouched.
    pub fn append<R: Rng + ?Sized>(
        &self,
        store: &mut Dungeon,
        registry: &MaterialRegistry,
        n: usize,
        rng: &mut R,
    ) -> TransportResult<()> {
        for _ in 0..n {
            let record = self.sample_particle(registry, rng)?;
            store.detain(record)?;
        }
        Ok(())
    }

    /// IMC emission: sample `n` records, then renormalize each record's
    /// weight by its material's sample count so the per-material total
    /// equals that material's true emitted energy.
    ///
    /// A material that emits but received no samples would silently lose
    /// its energy; that is a fatal error, not a warning.
    pub fn append_imc<R: Rng + ?Sized>(
        &self,
        store: &mut Dungeon,
        registry: &MaterialRegistry,
        n: usize,
        rng: &mut R,
    ) -> TransportResult<()> {
        if n == 0 {
            return Err(TransportError::InvalidConfig(
                "append_imc needs a positive sample count".into(),
            ));
        }
        let mut buffer = Vec::with_capacity(n);
        let mut counts = vec![0usize; registry.len()];
        for _ in 0..n {
            let record = self.sample_particle(registry, rng)?;
            counts[record.mat_index] += 1;
            buffer.push(record);
        }
        for (index, material) in registry.iter().enumerate() {
            if counts[index] == 0 && material.emitted_radiation() > 0.0 {
                return Err(TransportError::SourceUndersampled { index });
            }
        }
        debug!("append_imc: {} samples, per-material counts {:?}", n, counts);
        for mut record in buffer {
            record.weight /= counts[record.mat_index] as f64;
            store.detain(record)?;
        }
        Ok(())
    }
}
