//! Swarm configuration and inertia schedules.

use serde::{Deserialize, Serialize};

/// How the inertia weight `w` changes from one generation to the next.
///
/// Schedules depend only on the generation number, never on the total
/// generation budget, so a longer run replays a shorter one exactly.
///
/// # References
///
/// - Linear: Shi & Eberhart (1999), "Empirical study of particle swarm
///   optimization", CEC 1999
/// - Geometric: exponential decay with a floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InertiaSchedule {
    /// `w` falls linearly from `start` to `end` over `horizon` generations,
    /// then stays at `end`.
    Linear { start: f64, end: f64, horizon: usize },
    /// `w_t = max(floor, start · factor^t)`.
    Geometric { start: f64, factor: f64, floor: f64 },
    /// Fixed `w`.
    Constant { value: f64 },
}

impl Default for InertiaSchedule {
    fn default() -> Self {
        InertiaSchedule::Linear {
            start: 0.9,
            end: 0.4,
            horizon: 100,
        }
    }
}

impl InertiaSchedule {
    /// Inertia weight used in generation `generation` (0-based).
    pub fn weight(&self, generation: usize) -> f64 {
        match *self {
            InertiaSchedule::Linear {
                start,
                end,
                horizon,
            } => {
                if horizon == 0 || generation >= horizon {
                    end
                } else {
                    start + (end - start) * generation as f64 / horizon as f64
                }
            }
            InertiaSchedule::Geometric {
                start,
                factor,
                floor,
            } => (start * factor.powi(generation.min(i32::MAX as usize) as i32)).max(floor),
            InertiaSchedule::Constant { value } => value,
        }
    }

    fn validate(&self) -> Result<(), String> {
        let in_range = |w: f64| w.is_finite() && (0.0..=1.5).contains(&w);
        match *self {
            InertiaSchedule::Linear { start, end, .. } => {
                if !in_range(start) || !in_range(end) {
                    return Err(format!("linear inertia bounds must be in [0, 1.5], got {start} → {end}"));
                }
            }
            InertiaSchedule::Geometric {
                start,
                factor,
                floor,
            } => {
                if !in_range(start) || !in_range(floor) {
                    return Err(format!("geometric inertia start/floor must be in [0, 1.5], got {start}/{floor}"));
                }
                if !(factor > 0.0 && factor <= 1.0) {
                    return Err(format!("geometric inertia factor must be in (0, 1], got {factor}"));
                }
            }
            InertiaSchedule::Constant { value } => {
                if !in_range(value) {
                    return Err(format!("inertia must be in [0, 1.5], got {value}"));
                }
            }
        }
        Ok(())
    }
}

/// Configuration for the facility swarm search.
///
/// `particles`, `iterations`, `seed` and `geographic` are set from the
/// top-level solve options and are not part of the nested `pso` block.
///
/// # Examples
///
/// ```
/// use u_netdesign::location::{InertiaSchedule, PsoConfig};
///
/// let config = PsoConfig::default()
///     .with_particles(40)
///     .with_iterations(200)
///     .with_inertia(InertiaSchedule::Constant { value: 0.7 })
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsoConfig {
    /// Swarm size.
    #[serde(skip)]
    pub particles: usize,

    /// Maximum number of generations.
    #[serde(skip)]
    pub iterations: usize,

    /// Random seed for reproducibility.
    #[serde(skip)]
    pub seed: Option<u64>,

    /// Coordinates are longitude (`x`) and latitude (`y`) in degrees; the
    /// search box stays within [-180, 180] × [-90, 90].
    #[serde(skip)]
    pub geographic: bool,

    /// Pull towards the particle's own best (c1).
    pub cognitive: f64,

    /// Pull towards the swarm's best (c2).
    pub social: f64,

    pub inertia: InertiaSchedule,

    /// Stop after this many generations without a better global best.
    /// 0 = disabled.
    pub stagnation_limit: usize,

    /// Search box margin as a fraction of the customer extent.
    pub bounds_margin: f64,

    /// Initial velocities are drawn from ±this fraction of the box extent.
    pub initial_velocity: f64,

    /// Velocity is clamped to ±this fraction of the box extent.
    pub max_velocity: f64,

    /// Whether to evaluate particles in parallel using rayon.
    pub parallel: bool,

    /// Log the global best every this many generations. 0 = never.
    pub log_every: usize,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            particles: 30,
            iterations: 100,
            seed: None,
            geographic: false,
            cognitive: 2.0,
            social: 2.0,
            inertia: InertiaSchedule::default(),
            stagnation_limit: 25,
            bounds_margin: 0.05,
            initial_velocity: 0.1,
            max_velocity: 0.5,
            parallel: true,
            log_every: 10,
        }
    }
}

impl PsoConfig {
    pub fn with_particles(mut self, n: usize) -> Self {
        self.particles = n;
        self
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_geographic(mut self, geographic: bool) -> Self {
        self.geographic = geographic;
        self
    }

    pub fn with_cognitive(mut self, c1: f64) -> Self {
        self.cognitive = c1;
        self
    }

    pub fn with_social(mut self, c2: f64) -> Self {
        self.social = c2;
        self
    }

    pub fn with_inertia(mut self, schedule: InertiaSchedule) -> Self {
        self.inertia = schedule;
        self
    }

    pub fn with_stagnation_limit(mut self, n: usize) -> Self {
        self.stagnation_limit = n;
        self
    }

    pub fn with_bounds_margin(mut self, margin: f64) -> Self {
        self.bounds_margin = margin;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_log_every(mut self, n: usize) -> Self {
        self.log_every = n;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.particles == 0 {
            return Err("pso_particles must be at least 1".into());
        }
        if self.iterations == 0 {
            return Err("pso_iterations must be at least 1".into());
        }
        for (name, c) in [("cognitive", self.cognitive), ("social", self.social)] {
            if !(c.is_finite() && c >= 0.0) {
                return Err(format!("{name} coefficient must be non-negative, got {c}"));
            }
        }
        self.inertia.validate()?;
        for (name, f) in [
            ("bounds_margin", self.bounds_margin),
            ("initial_velocity", self.initial_velocity),
        ] {
            if !(f.is_finite() && f >= 0.0) {
                return Err(format!("{name} must be non-negative, got {f}"));
            }
        }
        if !(self.max_velocity.is_finite() && self.max_velocity > 0.0) {
            return Err(format!("max_velocity must be positive, got {}", self.max_velocity));
        }
        Ok(())
    }
}
