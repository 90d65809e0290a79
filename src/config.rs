//! Solve options shared by all engines.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMode;
use crate::location::{MilpConfig, PsoConfig};
use crate::routing::VrpConfig;

/// Configuration block of a problem instance.
///
/// Every field has a default, so a partial JSON block is accepted.
/// The top-level options override the matching fields of the nested engine
/// blocks; use [`SolveConfig::milp_config`], [`SolveConfig::pso_config`] and
/// [`SolveConfig::vrp_config`] to get the merged engine configurations.
///
/// # Examples
///
/// ```
/// use u_netdesign::config::SolveConfig;
///
/// let config: SolveConfig =
///     serde_json::from_str(r#"{"time_limit_seconds": 30, "pso_particles": 50}"#).unwrap();
/// assert_eq!(config.optimality_gap, 0.01);
/// assert_eq!(config.pso_config().particles, 50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    /// Wall-clock budget of one solve.
    pub time_limit_seconds: f64,

    /// Relative gap at which branch-and-bound may stop.
    pub optimality_gap: f64,

    pub pso_particles: usize,

    pub pso_iterations: usize,

    pub vrp_max_iterations: usize,

    pub distance_mode: DistanceMode,

    /// Seed for the swarm; drawn at random when absent.
    pub seed: Option<u64>,

    /// Extra swarm runs, with seed + k, while customers stay unplaced.
    pub heuristic_retries: u32,

    pub milp: MilpConfig,

    pub pso: PsoConfig,

    pub vrp: VrpConfig,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: 600.0,
            optimality_gap: 0.01,
            pso_particles: 30,
            pso_iterations: 100,
            vrp_max_iterations: 1000,
            distance_mode: DistanceMode::Euclidean,
            seed: None,
            heuristic_retries: 0,
            milp: MilpConfig::default(),
            pso: PsoConfig::default(),
            vrp: VrpConfig::default(),
        }
    }
}

impl SolveConfig {
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_seconds = seconds;
        self
    }

    pub fn with_optimality_gap(mut self, gap: f64) -> Self {
        self.optimality_gap = gap;
        self
    }

    pub fn with_pso_particles(mut self, n: usize) -> Self {
        self.pso_particles = n;
        self
    }

    pub fn with_pso_iterations(mut self, n: usize) -> Self {
        self.pso_iterations = n;
        self
    }

    pub fn with_vrp_max_iterations(mut self, n: usize) -> Self {
        self.vrp_max_iterations = n;
        self
    }

    pub fn with_distance_mode(mut self, mode: DistanceMode) -> Self {
        self.distance_mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_heuristic_retries(mut self, n: u32) -> Self {
        self.heuristic_retries = n;
        self
    }

    pub fn with_milp(mut self, milp: MilpConfig) -> Self {
        self.milp = milp;
        self
    }

    pub fn with_pso(mut self, pso: PsoConfig) -> Self {
        self.pso = pso;
        self
    }

    pub fn with_vrp(mut self, vrp: VrpConfig) -> Self {
        self.vrp = vrp;
        self
    }

    /// MILP configuration with the top-level gap applied.
    pub fn milp_config(&self) -> MilpConfig {
        self.milp.clone().with_relative_gap(self.optimality_gap)
    }

    /// Swarm configuration with the top-level particle, iteration, seed and
    /// distance options applied.
    pub fn pso_config(&self) -> PsoConfig {
        let mut pso = self
            .pso
            .clone()
            .with_particles(self.pso_particles)
            .with_iterations(self.pso_iterations)
            .with_geographic(self.distance_mode == DistanceMode::Haversine);
        pso.seed = self.seed;
        pso
    }

    /// Routing configuration with the top-level iteration budget applied.
    pub fn vrp_config(&self) -> VrpConfig {
        self.vrp.clone().with_max_iterations(self.vrp_max_iterations)
    }

    /// Validates the top-level options and every merged engine block.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.time_limit_seconds.is_finite() && self.time_limit_seconds >= 0.0) {
            return Err(format!(
                "time_limit_seconds must be a non-negative number, got {}",
                self.time_limit_seconds
            ));
        }
        if !(self.optimality_gap.is_finite() && self.optimality_gap >= 0.0) {
            return Err(format!(
                "optimality_gap must be non-negative, got {}",
                self.optimality_gap
            ));
        }
        self.milp_config().validate()?;
        self.pso_config().validate()?;
        self.vrp_config().validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructive::TieBreak;

    #[test]
    fn test_defaults() {
        let c = SolveConfig::default();
        assert_eq!(c.time_limit_seconds, 600.0);
        assert_eq!(c.optimality_gap, 0.01);
        assert_eq!(c.distance_mode, DistanceMode::Euclidean);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_top_level_options_reach_engines() {
        let c = SolveConfig::default()
            .with_optimality_gap(0.05)
            .with_pso_particles(12)
            .with_pso_iterations(7)
            .with_seed(99)
            .with_vrp_max_iterations(3);
        assert_eq!(c.milp_config().relative_gap, 0.05);
        let pso = c.pso_config();
        assert_eq!((pso.particles, pso.iterations, pso.seed), (12, 7, Some(99)));
        assert_eq!(c.vrp_config().max_iterations, 3);
        assert!(c.with_distance_mode(DistanceMode::Haversine).pso_config().geographic);
    }

    #[test]
    fn test_nested_blocks_from_json() {
        let c: SolveConfig = serde_json::from_str(
            r#"{
                "distance_mode": "manhattan",
                "pso_iterations": 5,
                "milp": {"single_sourcing": false},
                "pso": {"stagnation_limit": 0, "iterations": 999},
                "vrp": {"tie_break": "earliest-deadline"}
            }"#,
        )
        .expect("parse");
        assert_eq!(c.distance_mode, DistanceMode::Manhattan);
        assert!(!c.pso_config().geographic);
        assert!(!c.milp_config().single_sourcing);
        assert_eq!(c.pso_config().stagnation_limit, 0);
        // the nested block cannot override the top-level budget
        assert_eq!(c.pso_config().iterations, 5);
        assert_eq!(c.vrp_config().tie_break, TieBreak::EarliestDeadline);
    }

    #[test]
    fn test_invalid_values() {
        assert!(SolveConfig::default().with_time_limit(-1.0).validate().is_err());
        assert!(SolveConfig::default().with_time_limit(f64::NAN).validate().is_err());
        assert!(SolveConfig::default().with_optimality_gap(-0.1).validate().is_err());
        assert!(SolveConfig::default().with_pso_particles(0).validate().is_err());
        let err = SolveConfig::default()
            .with_vrp(VrpConfig::default().with_speed(0.0))
            .validate()
            .expect_err("zero speed");
        assert!(err.contains("speed"));
    }

    #[test]
    fn test_serialize_skips_engine_overrides() {
        let json = serde_json::to_value(SolveConfig::default().with_seed(1)).expect("serialize");
        assert_eq!(json["seed"], 1);
        assert!(json["pso"].get("particles").is_none());
        assert!(json["milp"].get("relative_gap").is_none());
    }
}
