//! Particle swarm search for facility coordinates.
//!
//! - [`PsoConfig`] — swarm size, coefficients, [`InertiaSchedule`], stopping rules
//! - [`PsoRunner`] — the search loop; particles are scored with
//!   [`greedy_assignment`](super::greedy_assignment)

mod config;
mod runner;

pub use config::{InertiaSchedule, PsoConfig};
pub use runner::{Metric, PsoResult, PsoRunner, PsoTermination};
