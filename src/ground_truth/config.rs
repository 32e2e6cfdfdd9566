use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;

/// Parameters of the capped, biased color draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    /// Markers `0..universe_size` take part in the session.
    pub universe_size: u32,

    /// Upper bound on alarm (red) markers.
    pub max_alarm: u32,

    /// Probability that a visited marker turns red while under the cap.
    pub p_alarm: f64,

    /// Fixed seed for reproducible trials; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            universe_size: 15,
            max_alarm: 3,
            p_alarm: 0.3,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.universe_size == 0 {
            return Err(ExperimentError::Config(
                "marker universe must contain at least one marker".into(),
            ));
        }
        if !self.p_alarm.is_finite() || !(0.0..=1.0).contains(&self.p_alarm) {
            return Err(ExperimentError::Config(format!(
                "alarm probability {} is outside [0, 1]",
                self.p_alarm
            )));
        }
        Ok(())
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_universe_is_rejected() {
        let config = GeneratorConfig {
            universe_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ExperimentError::Config(_))));
    }

    #[test]
    fn probability_out_of_range_is_rejected() {
        for p_alarm in [-0.1, 1.5, f64::NAN] {
            let config = GeneratorConfig {
                p_alarm,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "p_alarm {p_alarm} accepted");
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"maxAlarm": 5}"#).unwrap();
        assert_eq!(config.max_alarm, 5);
        assert_eq!(config.universe_size, 15);
    }
}
