//! Single-customer relocation, within a route and between routes.
//!
//! # Algorithm
//!
//! Removes one customer from its route and reinserts it elsewhere: at
//! another position of the same route (intra) or at any position of another
//! route, empty routes included (inter). The first move whose cost delta is
//! strictly negative and whose receiving routes stay feasible is applied.
//!
//! # Complexity
//!
//! O(n² × R) delta evaluations per scan where n = customers per route,
//! R = number of routes; each candidate that improves is checked with a
//! full route evaluation.
//!
//! # Reference
//!
//! Or, I. (1976). "Traveling Salesman-Type Combinatorial Problems and Their
//! Relation to the Logistics of Blood Banking". PhD thesis.

use crate::constructive::insertion_delta;
use crate::evaluation::RouteEvaluator;
use crate::models::RoutingNetwork;

use super::{removal_delta, IMPROVEMENT_EPS};

/// Applies the first improving intra-route relocation.
///
/// Returns `true` if a move was applied.
///
/// # Examples
///
/// ```
/// use u_netdesign::distance::{DistanceMatrix, DistanceMode};
/// use u_netdesign::evaluation::{route_distance, RouteEvaluator};
/// use u_netdesign::local_search::relocate_intra;
/// use u_netdesign::models::{Customer, Depot, Point, RoutingNetwork, Vehicle};
///
/// let depot = Depot::new("D", Point::new(0.0, 0.0));
/// let customers = vec![
///     Customer::new("C1", Point::new(1.0, 0.0), 1.0),
///     Customer::new("C2", Point::new(2.0, 0.0), 1.0),
///     Customer::new("C3", Point::new(3.0, 0.0), 1.0),
/// ];
/// let pts: Vec<Point> = std::iter::once(depot.location())
///     .chain(customers.iter().map(|c| c.location()))
///     .collect();
/// let dm = DistanceMatrix::from_points(&pts, DistanceMode::Euclidean).unwrap();
/// let net = RoutingNetwork::new(depot, customers, dm, 1.0);
/// let fleet = [Vehicle::new("V1", 10.0)];
/// let evals = [RouteEvaluator::new(&net, &fleet[0], 0)];
///
/// let mut routes = vec![vec![1, 3, 2]];
/// let before = route_distance(&net, &routes[0]);
/// assert!(relocate_intra(&net, &evals, &mut routes));
/// assert!(route_distance(&net, &routes[0]) < before);
/// ```
pub fn relocate_intra(
    network: &RoutingNetwork,
    evaluators: &[RouteEvaluator<'_>],
    routes: &mut [Vec<usize>],
) -> bool {
    for (r, seq) in routes.iter_mut().enumerate() {
        if seq.len() < 2 {
            continue;
        }
        let rate = evaluators[r].vehicle().cost_per_distance();
        for from in 0..seq.len() {
            let node = seq[from];
            let removed = removal_delta(network, seq, from);
            let mut reduced = seq.clone();
            reduced.remove(from);

            for to in 0..=reduced.len() {
                if to == from {
                    continue;
                }
                let delta = (removed + insertion_delta(network, &reduced, to, node)) * rate;
                if delta >= -IMPROVEMENT_EPS {
                    continue;
                }
                let mut trial = reduced.clone();
                trial.insert(to, node);
                if evaluators[r].is_feasible(&trial) {
                    *seq = trial;
                    return true;
                }
            }
        }
    }
    false
}

/// Applies the first improving relocation of a customer into another route.
///
/// Empty routes (unused vehicles) are valid targets. Returns `true` if a
/// move was applied.
pub fn relocate_inter(
    network: &RoutingNetwork,
    evaluators: &[RouteEvaluator<'_>],
    routes: &mut [Vec<usize>],
) -> bool {
    let loads: Vec<f64> = routes
        .iter()
        .map(|seq| seq.iter().map(|&n| network.demand(n)).sum())
        .collect();

    for from_r in 0..routes.len() {
        let from_rate = evaluators[from_r].vehicle().cost_per_distance();
        for from_pos in 0..routes[from_r].len() {
            let node = routes[from_r][from_pos];
            let demand = network.demand(node);
            let removed = removal_delta(network, &routes[from_r], from_pos) * from_rate;

            for to_r in 0..routes.len() {
                if to_r == from_r {
                    continue;
                }
                let vehicle = evaluators[to_r].vehicle();
                if loads[to_r] + demand > vehicle.capacity() + crate::models::LOAD_EPS {
                    continue;
                }
                let to_rate = vehicle.cost_per_distance();

                for to_pos in 0..=routes[to_r].len() {
                    let delta =
                        removed + insertion_delta(network, &routes[to_r], to_pos, node) * to_rate;
                    if delta >= -IMPROVEMENT_EPS {
                        continue;
                    }
                    let mut target = routes[to_r].clone();
                    target.insert(to_pos, node);
                    if !evaluators[to_r].is_feasible(&target) {
                        continue;
                    }
                    let mut source = routes[from_r].clone();
                    source.remove(from_pos);
                    if !evaluators[from_r].is_feasible(&source) {
                        continue;
                    }
                    routes[from_r] = source;
                    routes[to_r] = target;
                    return true;
                }
            }
        }
    }
    false
}
