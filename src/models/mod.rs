//! Domain model types for network design problems.
//!
//! Points and demand nodes shared by every engine, candidate sites for the
//! exact location model, vehicles and depots for routing, and the route
//! state the routing engine works on.

mod customer;
mod facility;
mod point;
mod problem;
mod route;
mod solution;
mod vehicle;

pub use customer::{Customer, Depot, TimeWindow};
pub use facility::CandidateFacility;
pub use point::Point;
pub use problem::RoutingNetwork;
pub use route::{Route, Visit};
pub use solution::{RoutingSolution, UnassignedReason};
pub use vehicle::Vehicle;

/// Slack allowed when comparing times against window bounds.
pub(crate) const TIME_EPS: f64 = 1e-9;

/// Slack allowed when comparing loads against capacities.
pub(crate) const LOAD_EPS: f64 = 1e-9;
