//! Facility location engines.
//!
//! - [`MilpLocationRunner`] — exact model over candidate sites, solved by any
//!   [`MilpBackend`](crate::milp::MilpBackend)
//! - [`PsoRunner`] — particle swarm over free coordinates
//! - [`greedy_assignment`] — capacitated nearest-site assignment scoring
//!   each swarm particle
//!
//! Both engines report a [`FacilityPlan`].

mod assign;
mod exact;
mod plan;
mod pso;

pub use assign::{
    demand_order, fixed_assignment, greedy_assignment, pack_exact, Assignment, NewSites, Packing, UNPLACED_PENALTY,
};
pub use exact::{MilpConfig, MilpLocationResult, MilpLocationRunner, SiteDistances};
pub use plan::{CustomerAssignment, FacilityPlan, Flow, SiteReport};
pub use pso::{InertiaSchedule, Metric, PsoConfig, PsoResult, PsoRunner, PsoTermination};
