// Absorbed-energy scoring, one accumulator per material region.

use std::fmt;

use crate::error::{TransportError, TransportResult};

/// Per-material absorbed-energy tally for one time step.
///
/// Scored serially, or in parallel by giving each worker its own tally and
/// folding with [`EnergyTally::merge`].
#[derive(Debug, Clone)]
pub struct EnergyTally {
    pub name: String,
    /// Energy units of the run (jerks in the default unit system).
    pub units: String,
    absorbed: Vec<f64>,
    events: Vec<u64>,
}

impl EnergyTally {
    pub fn new(name: &str, n_materials: usize) -> Self {
        Self {
            name: name.to_string(),
            units: "jerks".to_string(),
            absorbed: vec![0.0; n_materials],
            events: vec![0; n_materials],
        }
    }

    pub fn n_materials(&self) -> usize {
        self.absorbed.len()
    }

    /// Add one absorption event's energy to a material's accumulator.
    pub fn score(&mut self, mat_index: usize, energy: f64) -> TransportResult<()> {
        if mat_index >= self.absorbed.len() {
            return Err(TransportError::UnknownMaterial {
                index: mat_index,
                count: self.absorbed.len(),
            });
        }
        self.absorbed[mat_index] += energy;
        self.events[mat_index] += 1;
        Ok(())
    }

    pub fn absorbed(&self) -> &[f64] {
        &self.absorbed
    }

    pub fn events(&self, mat_index: usize) -> TransportResult<u64> {
        self.events
            .get(mat_index)
            .copied()
            .ok_or(TransportError::UnknownMaterial {
                index: mat_index,
                count: self.events.len(),
            })
    }

    pub fn total(&self) -> f64 {
        self.absorbed.iter().sum()
    }

    /// Fold another tally of the same shape into this one.
    pub fn merge(&mut self, other: &EnergyTally) -> TransportResult<()> {
        if other.absorbed.len() != self.absorbed.len() {
            return Err(TransportError::InvalidConfig(format!(
                "cannot merge tally over {} materials into one over {}",
                other.absorbed.len(),
                self.absorbed.len()
            )));
        }
        for (a, b) in self.absorbed.iter_mut().zip(&other.absorbed) {
            *a += b;
        }
        for (a, b) in self.events.iter_mut().zip(&other.events) {
            *a += b;
        }
        Ok(())
    }

    /// Zero the accumulators for the next step.
    pub fn reset(&mut self) {
        self.absorbed.iter_mut().for_each(|a| *a = 0.0);
        self.events.iter_mut().for_each(|e| *e = 0);
    }
}

impl fmt::Display for EnergyTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.name, self.units)?;
        for (i, (e, n)) in self.absorbed.iter().zip(&self.events).enumerate() {
            writeln!(f, "  material {}: {:.6e} over {} events", i, e, n)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_and_total() {
        let mut tally = EnergyTally::new("absorption", 2);
        tally.score(0, 1.5).unwrap();
        tally.score(0, 0.5).unwrap();
        tally.score(1, 3.0).unwrap();
        assert_eq!(tally.absorbed(), &[2.0, 3.0]);
        assert_eq!(tally.total(), 5.0);
        assert_eq!(tally.events(0).unwrap(), 2);
    }

    #[test]
    fn test_unknown_material_rejected() {
        let mut tally = EnergyTally::new("absorption", 1);
        assert!(matches!(
            tally.score(1, 1.0),
            Err(TransportError::UnknownMaterial { index: 1, count: 1 })
        ));
    }

    #[test]
    fn test_merge_and_reset() {
        let mut a = EnergyTally::new("absorption", 2);
        let mut b = EnergyTally::new("absorption", 2);
        a.score(0, 1.0).unwrap();
        b.score(1, 2.0).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a.absorbed(), &[1.0, 2.0]);
        a.reset();
        assert_eq!(a.total(), 0.0);
        assert_eq!(a.events(1).unwrap(), 0);

        let c = EnergyTally::new("absorption", 3);
        assert!(a.merge(&c).is_err());
    }

    #[test]
    fn test_display_lists_materials() {
        let mut tally = EnergyTally::new("absorption", 1);
        tally.score(0, 2.0).unwrap();
        let text = format!("{}", tally);
        assert!(text.contains("absorption"));
        assert!(text.contains("material 0"));
    }
}
