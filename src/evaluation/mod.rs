//! Route feasibility checking and cost evaluation.

mod evaluator;

pub use evaluator::{audit_solution, route_distance, RouteEvaluator, Violation};
