//! Global cheapest-insertion construction for capacitated routing with
//! time windows.
//!
//! # Algorithm
//!
//! Repeatedly picks the (customer, route, position) triple with the lowest
//! marginal cost that keeps the receiving route feasible:
//!
//! Δ(i,u,j) = (d(i,u) + d(u,j) − d(i,j)) · cost_per_distance
//!
//! where (i,j) is the edge being broken and u is the customer to insert.
//! Only routes of vehicles already in use are considered. When no feasible
//! insertion remains, the next unused vehicle in fleet order is opened and
//! the search repeats. Customers that cannot be placed once the fleet is
//! exhausted are reported with a reason, never dropped.
//!
//! # Complexity
//!
//! O(n³ · m) where n = customers, m = vehicles (each candidate is checked
//! with a full route evaluation).
//!
//! # Reference
//!
//! Solomon, M.M. (1987). "Algorithms for the Vehicle Routing and Scheduling
//! Problems with Time Window Constraints", *Operations Research* 35(2), 254-265.

use serde::{Deserialize, Serialize};

use crate::evaluation::{RouteEvaluator, Violation};
use crate::models::{RoutingNetwork, UnassignedReason, Vehicle};
use crate::quota::SolveContext;

const DELTA_EPS: f64 = 1e-9;

/// Which candidate wins when two insertions cost the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// The customer listed first in the input.
    #[default]
    InputOrder,
    /// The customer whose window closes first; customers without a window
    /// come last, input order among equals.
    EarliestDeadline,
}

/// Routes and leftovers produced by [`cheapest_insertion`].
#[derive(Debug, Clone, PartialEq)]
pub struct Construction {
    /// One node sequence per fleet vehicle; empty for unused vehicles.
    pub routes: Vec<Vec<usize>>,
    /// Customers that could not be placed.
    pub unassigned: Vec<(usize, UnassignedReason)>,
    /// `true` when the deadline stopped construction early.
    pub interrupted: bool,
}

/// Builds an initial route set by global cheapest insertion.
///
/// Every returned route is feasible. Customers that cannot be served even
/// on a dedicated route get [`UnassignedReason::Capacity`],
/// [`UnassignedReason::TimeWindow`] or [`UnassignedReason::RouteLimit`];
/// customers left over when the fleet runs out get
/// [`UnassignedReason::FleetExhausted`]; customers still pending when the
/// deadline passes get [`UnassignedReason::TimeLimit`].
///
/// # Examples
///
/// ```
/// use u_netdesign::constructive::{cheapest_insertion, TieBreak};
/// use u_netdesign::distance::{DistanceMatrix, DistanceMode};
/// use u_netdesign::models::{Customer, Depot, Point, RoutingNetwork, Vehicle};
/// use u_netdesign::quota::SolveContext;
///
/// let depot = Depot::new("D", Point::new(0.0, 0.0));
/// let customers = vec![
///     Customer::new("C1", Point::new(1.0, 0.0), 8.0),
///     Customer::new("C2", Point::new(2.0, 0.0), 8.0),
/// ];
/// let pts = [depot.location(), customers[0].location(), customers[1].location()];
/// let dm = DistanceMatrix::from_points(&pts, DistanceMode::Euclidean).unwrap();
/// let net = RoutingNetwork::new(depot, customers, dm, 1.0);
/// let fleet = vec![Vehicle::new("V1", 10.0), Vehicle::new("V2", 10.0)];
///
/// let built = cheapest_insertion(&net, &fleet, TieBreak::InputOrder, &SolveContext::unbounded());
/// assert!(built.unassigned.is_empty());
/// assert_eq!(built.routes.iter().filter(|r| !r.is_empty()).count(), 2);
/// ```
pub fn cheapest_insertion(
    network: &RoutingNetwork,
    vehicles: &[Vehicle],
    tie_break: TieBreak,
    ctx: &SolveContext,
) -> Construction {
    let mut routes: Vec<Vec<usize>> = vec![Vec::new(); vehicles.len()];
    let mut unassigned = Vec::new();
    let evaluators: Vec<RouteEvaluator<'_>> = vehicles
        .iter()
        .enumerate()
        .map(|(i, v)| RouteEvaluator::new(network, v, i))
        .collect();

    let mut pending = Vec::new();
    for node in network.customer_nodes() {
        match solo_reason(network, &evaluators, node) {
            Some(reason) => unassigned.push((node, reason)),
            None => pending.push(node),
        }
    }
    if tie_break == TieBreak::EarliestDeadline {
        pending.sort_by(|&a, &b| deadline(network, a).total_cmp(&deadline(network, b)));
    }

    let mut opened = 0;
    let mut interrupted = false;
    while !pending.is_empty() {
        if ctx.is_stopped() {
            interrupted = true;
            break;
        }

        let mut best: Option<(usize, usize, usize, f64)> = None; // (pending idx, route, pos, delta)
        for (pi, &node) in pending.iter().enumerate() {
            for (r, seq) in routes.iter().enumerate().take(opened) {
                let rate = vehicles[r].cost_per_distance();
                for pos in 0..=seq.len() {
                    let delta = insertion_delta(network, seq, pos, node) * rate;
                    if best.is_some_and(|b| delta >= b.3 - DELTA_EPS) {
                        continue;
                    }
                    let mut trial = seq.clone();
                    trial.insert(pos, node);
                    if evaluators[r].is_feasible(&trial) {
                        best = Some((pi, r, pos, delta));
                    }
                }
            }
        }

        match best {
            Some((pi, r, pos, _)) => {
                let node = pending.remove(pi);
                routes[r].insert(pos, node);
            }
            None if opened < vehicles.len() => {
                opened += 1;
                ctx.log(&format!("construction: opened vehicle {}", vehicles[opened - 1].id()));
            }
            None => break,
        }
    }

    let leftover = if interrupted {
        UnassignedReason::TimeLimit
    } else {
        UnassignedReason::FleetExhausted
    };
    unassigned.extend(pending.into_iter().map(|node| (node, leftover)));
    unassigned.sort_by_key(|&(node, _)| node);

    ctx.log(&format!(
        "construction: {} routes used, {} customers unassigned",
        routes.iter().filter(|r| !r.is_empty()).count(),
        unassigned.len()
    ));

    Construction {
        routes,
        unassigned,
        interrupted,
    }
}

/// Marginal distance of inserting `node` before position `pos` of `seq`.
pub(crate) fn insertion_delta(network: &RoutingNetwork, seq: &[usize], pos: usize, node: usize) -> f64 {
    let prev = if pos == 0 { 0 } else { seq[pos - 1] };
    let next = if pos == seq.len() { 0 } else { seq[pos] };
    network.distance(prev, node) + network.distance(node, next) - network.distance(prev, next)
}

/// Why a customer cannot be served alone by any vehicle, or `None` if some
/// vehicle can.
fn solo_reason(
    network: &RoutingNetwork,
    evaluators: &[RouteEvaluator<'_>],
    node: usize,
) -> Option<UnassignedReason> {
    if evaluators.is_empty() {
        return Some(UnassignedReason::FleetExhausted);
    }
    let mut fits_somewhere = false;
    let mut window_bound = true;
    for eval in evaluators {
        if network.demand(node) > eval.vehicle().capacity() {
            continue;
        }
        fits_somewhere = true;
        let (_, violations) = eval.build_route(&[node]);
        if violations.is_empty() {
            return None;
        }
        window_bound &= violations.iter().any(|v| {
            matches!(
                v,
                Violation::TimeWindowViolated { .. } | Violation::DepotClosed { .. }
            )
        });
    }
    Some(if !fits_somewhere {
        UnassignedReason::Capacity
    } else if window_bound {
        UnassignedReason::TimeWindow
    } else {
        UnassignedReason::RouteLimit
    })
}

fn deadline(network: &RoutingNetwork, node: usize) -> f64 {
    network
        .customer(node)
        .time_window()
        .map_or(f64::INFINITY, |tw| tw.latest())
}
