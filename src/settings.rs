use crate::error::{TransportError, TransportResult};

/// Run control for the time-step driver.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Emission samples per time step.
    pub particles: usize,
    /// Number of time steps.
    pub steps: usize,
    /// Step length in shakes.
    pub dt: f64,
    /// Capacity of the census population store.
    pub max_population: usize,
    /// Per-material census cap applied at step boundaries; `None` disables
    /// population control.
    pub region_cap: Option<usize>,
    pub seed: Option<u64>,
}

impl Settings {
    pub fn validate(&self) -> TransportResult<()> {
        if self.particles == 0 {
            return Err(TransportError::InvalidConfig(
                "settings: particles must be >= 1".into(),
            ));
        }
        if self.steps == 0 {
            return Err(TransportError::InvalidConfig(
                "settings: steps must be >= 1".into(),
            ));
        }
        if self.dt <= 0.0 || !self.dt.is_finite() {
            return Err(TransportError::InvalidConfig(format!(
                "settings: dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if self.max_population == 0 {
            return Err(TransportError::InvalidConfig(
                "settings: max_population must be >= 1".into(),
            ));
        }
        if self.region_cap == Some(0) {
            return Err(TransportError::InvalidConfig(
                "settings: region_cap must be >= 1 when set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good() -> Settings {
        Settings {
            particles: 100,
            steps: 10,
            dt: 0.1,
            max_population: 10_000,
            region_cap: Some(50),
            seed: Some(42),
        }
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(good().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut s = good();
        s.particles = 0;
        assert!(s.validate().is_err());

        let mut s = good();
        s.dt = 0.0;
        assert!(s.validate().is_err());

        let mut s = good();
        s.region_cap = Some(0);
        assert!(s.validate().is_err());

        let mut s = good();
        s.max_population = 0;
        assert!(s.validate().is_err());
    }
}
