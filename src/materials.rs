// Registry of the material regions present in a problem.

use crate::config::MaterialConfig;
use crate::error::{TransportError, TransportResult};
use crate::material::ImcMaterial;

/// Owns one [`ImcMaterial`] per distinct material region; geometry
/// `mat_index` values index into this.
///
/// Shared read-mostly during sampling and transport; mutated exactly once
/// per step through [`MaterialRegistry::set_time_step`] and
/// [`MaterialRegistry::update_all`], which the driver sequences after
/// tallying and before the next step's sampling.
#[derive(Debug, Clone)]
pub struct MaterialRegistry {
    materials: Vec<ImcMaterial>,
}

impl MaterialRegistry {
    pub fn from_configs(configs: &[MaterialConfig]) -> TransportResult<Self> {
        if configs.is_empty() {
            return Err(TransportError::InvalidConfig(
                "registry needs at least one material".into(),
            ));
        }
        let materials = configs
            .iter()
            .enumerate()
            .map(|(i, cfg)| ImcMaterial::from_config(i, cfg))
            .collect::<TransportResult<Vec<_>>>()?;
        Ok(Self { materials })
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn get(&self, index: usize) -> TransportResult<&ImcMaterial> {
        self.materials
            .get(index)
            .ok_or(TransportError::UnknownMaterial {
                index,
                count: self.materials.len(),
            })
    }

    pub fn get_mut(&mut self, index: usize) -> TransportResult<&mut ImcMaterial> {
        let count = self.materials.len();
        self.materials
            .get_mut(index)
            .ok_or(TransportError::UnknownMaterial { index, count })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImcMaterial> {
        self.materials.iter()
    }

    /// Propagate a new step length to every material.
    pub fn set_time_step(&mut self, dt: f64) -> TransportResult<()> {
        for mat in &mut self.materials {
            mat.set_time_step(dt)?;
        }
        Ok(())
    }

    /// Apply the once-per-step energy update, one absorbed-energy entry per
    /// material.
    pub fn update_all(&mut self, absorbed: &[f64]) -> TransportResult<()> {
        if absorbed.len() != self.materials.len() {
            return Err(TransportError::InvalidConfig(format!(
                "absorbed-energy tally has {} entries for {} materials",
                absorbed.len(),
                self.materials.len()
            )));
        }
        for (mat, &e) in self.materials.iter_mut().zip(absorbed) {
            mat.update_mat(e)?;
        }
        Ok(())
    }
}
