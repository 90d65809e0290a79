//! Routing engine configuration.

use serde::{Deserialize, Serialize};

use crate::constructive::TieBreak;

/// Configuration for the routing engine.
///
/// `max_iterations` is set from the top-level `vrp_max_iterations` option.
///
/// # Examples
///
/// ```
/// use u_netdesign::constructive::TieBreak;
/// use u_netdesign::routing::VrpConfig;
///
/// let config = VrpConfig::default()
///     .with_speed(40.0)
///     .with_tie_break(TieBreak::EarliestDeadline);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrpConfig {
    /// Improving moves applied at most. 0 skips the improvement phase.
    #[serde(skip)]
    pub max_iterations: usize,

    /// Distance units travelled per time unit.
    pub speed: f64,

    /// Longest segment moved by the segment exchange.
    pub max_segment_len: usize,

    /// Winner among equal-cost insertions.
    pub tie_break: TieBreak,
}

impl Default for VrpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            speed: 1.0,
            max_segment_len: 2,
            tie_break: TieBreak::default(),
        }
    }
}

impl VrpConfig {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_max_segment_len(mut self, len: usize) -> Self {
        self.max_segment_len = len;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(format!("speed must be positive, got {}", self.speed));
        }
        if self.max_segment_len == 0 {
            return Err("max_segment_len must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = VrpConfig::default();
        assert_eq!(c.max_iterations, 1000);
        assert_eq!(c.tie_break, TieBreak::InputOrder);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_invalid_speed() {
        assert!(VrpConfig::default().with_speed(0.0).validate().is_err());
        assert!(VrpConfig::default().with_speed(f64::NAN).validate().is_err());
        assert!(VrpConfig::default().with_max_segment_len(0).validate().is_err());
    }

    #[test]
    fn test_json_block() {
        let c: VrpConfig =
            serde_json::from_str(r#"{"tie_break": "earliest-deadline", "speed": 2.0}"#).expect("parse");
        assert_eq!(c.tie_break, TieBreak::EarliestDeadline);
        assert_eq!(c.max_segment_len, 2);
    }
}
