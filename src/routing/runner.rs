//! Construction plus first-improvement local search.

use serde::{Deserialize, Serialize};

use crate::constructive::cheapest_insertion;
use crate::error::SolveError;
use crate::evaluation::{audit_solution, RouteEvaluator};
use crate::local_search::{improve_once, Neighborhood};
use crate::models::{RoutingNetwork, RoutingSolution, Vehicle};
use crate::quota::SolveContext;

use super::config::VrpConfig;

/// Why the improvement phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VrpTermination {
    /// A full pass found no improving move.
    LocalOptimum,
    /// `max_iterations` moves were applied.
    IterationLimit,
    /// The deadline passed or the solve was cancelled.
    TimeLimit,
}

impl VrpTermination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalOptimum => "local-optimum",
            Self::IterationLimit => "iteration-limit",
            Self::TimeLimit => "time-limit",
        }
    }
}

/// Moves applied by one neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCount {
    pub neighborhood: Neighborhood,
    pub applied: usize,
}

/// Result of a routing run.
#[derive(Debug, Clone, PartialEq)]
pub struct VrpResult {
    /// One route per fleet vehicle plus unplaced customers.
    pub solution: RoutingSolution,
    /// Route cost right after construction.
    pub initial_cost: f64,
    /// Improving moves applied.
    pub iterations: usize,
    /// Applied moves per neighborhood, in scan order.
    pub moves: Vec<MoveCount>,
    pub termination: VrpTermination,
}

impl VrpResult {
    /// Returns `true` if the deadline cut construction or improvement short.
    pub fn hit_time_limit(&self) -> bool {
        self.termination == VrpTermination::TimeLimit
    }
}

/// Executes the routing engine.
///
/// # Usage
///
/// ```
/// use u_netdesign::distance::{DistanceMatrix, DistanceMode};
/// use u_netdesign::models::{Customer, Depot, Point, RoutingNetwork, Vehicle};
/// use u_netdesign::quota::SolveContext;
/// use u_netdesign::routing::{VrpConfig, VrpRunner};
///
/// let depot = Depot::new("D", Point::new(0.0, 0.0));
/// let customers = vec![
///     Customer::new("C1", Point::new(0.0, 5.0), 4.0),
///     Customer::new("C2", Point::new(5.0, 0.0), 4.0),
///     Customer::new("C3", Point::new(0.0, 6.0), 4.0),
/// ];
/// let pts: Vec<Point> = std::iter::once(depot.location())
///     .chain(customers.iter().map(|c| c.location()))
///     .collect();
/// let dm = DistanceMatrix::from_points(&pts, DistanceMode::Euclidean).unwrap();
/// let net = RoutingNetwork::new(depot, customers, dm, 1.0);
/// let fleet = vec![Vehicle::new("V1", 10.0), Vehicle::new("V2", 10.0), Vehicle::new("V3", 10.0)];
///
/// let result = VrpRunner::run(&net, &fleet, &VrpConfig::default(), &SolveContext::unbounded()).unwrap();
/// assert!(result.solution.is_complete());
/// assert_eq!(result.solution.num_routes(), 3);
/// ```
pub struct VrpRunner;

impl VrpRunner {
    /// Routes every customer of `network` with `vehicles`.
    ///
    /// Customers that cannot be served are listed in the solution with a
    /// reason; the returned routes always satisfy every hard constraint.
    /// Fails with [`SolveError::SolverFailure`] only if a final audit finds a
    /// violation.
    pub fn run(
        network: &RoutingNetwork,
        vehicles: &[Vehicle],
        config: &VrpConfig,
        ctx: &SolveContext,
    ) -> Result<VrpResult, SolveError> {
        config.validate().map_err(SolveError::InvalidInput)?;

        let built = cheapest_insertion(network, vehicles, config.tie_break, ctx);
        let evaluators: Vec<RouteEvaluator<'_>> = vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| RouteEvaluator::new(network, v, i))
            .collect();
        let total_cost = |routes: &[Vec<usize>]| -> f64 {
            routes.iter().zip(&evaluators).map(|(r, e)| e.cost(r)).sum()
        };

        let mut routes = built.routes;
        let initial_cost = total_cost(&routes);
        let mut counts = vec![0usize; Neighborhood::ORDER.len()];
        let mut iterations = 0;

        let termination = if built.interrupted {
            VrpTermination::TimeLimit
        } else {
            loop {
                if iterations >= config.max_iterations {
                    break VrpTermination::IterationLimit;
                }
                if ctx.is_stopped() {
                    break VrpTermination::TimeLimit;
                }
                match improve_once(network, &evaluators, &mut routes, config.max_segment_len) {
                    Some(hood) => {
                        iterations += 1;
                        if let Some(slot) = Neighborhood::ORDER.iter().position(|&h| h == hood) {
                            counts[slot] += 1;
                        }
                    }
                    None => break VrpTermination::LocalOptimum,
                }
            }
        };

        let final_cost = total_cost(&routes);
        ctx.log(&format!(
            "routing: cost {initial_cost:.4} → {final_cost:.4} after {iterations} moves ({})",
            termination.as_str()
        ));

        let mut solution = RoutingSolution::from_routes(
            routes
                .iter()
                .zip(&evaluators)
                .map(|(seq, e)| e.build_route(seq).0)
                .collect(),
        );
        for (node, reason) in built.unassigned {
            solution.add_unassigned(node, reason);
        }

        let violations = audit_solution(network, vehicles, &solution);
        if let Some(v) = violations.first() {
            return Err(SolveError::failure(format!("route audit failed: {v:?}")));
        }

        Ok(VrpResult {
            solution,
            initial_cost,
            iterations,
            moves: Neighborhood::ORDER
                .iter()
                .zip(counts)
                .map(|(&neighborhood, applied)| MoveCount {
                    neighborhood,
                    applied,
                })
                .collect(),
            termination,
        })
    }
}
