//! Inter-route segment exchange (CROSS exchange).
//!
//! # Algorithm
//!
//! Swaps a segment of consecutive customers of one route with a segment of
//! another route, both of length 1..=`max_len`, keeping their internal
//! order. Given R1 = [.., a, S1, b, ..] and R2 = [.., c, S2, d, ..]:
//!
//! R1' = [.., a, S2, b, ..]
//! R2' = [.., c, S1, d, ..]
//!
//! With `max_len = 1` this is the classic single-customer swap. The first
//! swap with a strictly negative cost delta that keeps both routes feasible
//! is applied.
//!
//! # Complexity
//!
//! O(n² × L² × R²) delta evaluations per scan, where n = customers per
//! route, L = `max_len`, R = number of routes.
//!
//! # Reference
//!
//! Taillard, É., Badeau, P., Gendreau, M., Guertin, F. & Potvin, J.-Y. (1997).
//! "A Tabu Search Heuristic for the Vehicle Routing Problem with Soft Time
//! Windows", *Transportation Science* 31(2), 170-186.

use crate::evaluation::RouteEvaluator;
use crate::models::{RoutingNetwork, LOAD_EPS};

use super::{replace_delta, IMPROVEMENT_EPS};

/// Applies the first improving segment exchange between two routes.
///
/// Returns `true` if a move was applied.
///
/// # Examples
///
/// ```
/// use u_netdesign::distance::{DistanceMatrix, DistanceMode};
/// use u_netdesign::evaluation::RouteEvaluator;
/// use u_netdesign::local_search::segment_exchange;
/// use u_netdesign::models::{Customer, Depot, Point, RoutingNetwork, Vehicle};
///
/// let depot = Depot::new("D", Point::new(0.0, 0.0));
/// let customers = vec![
///     Customer::new("E1", Point::new(10.0, 0.0), 1.0),
///     Customer::new("W1", Point::new(-10.0, 0.0), 1.0),
///     Customer::new("E2", Point::new(11.0, 0.0), 1.0),
///     Customer::new("W2", Point::new(-11.0, 0.0), 1.0),
/// ];
/// let pts: Vec<Point> = std::iter::once(depot.location())
///     .chain(customers.iter().map(|c| c.location()))
///     .collect();
/// let dm = DistanceMatrix::from_points(&pts, DistanceMode::Euclidean).unwrap();
/// let net = RoutingNetwork::new(depot, customers, dm, 1.0);
/// let fleet = [Vehicle::new("V1", 2.0), Vehicle::new("V2", 2.0)];
/// let evals = [
///     RouteEvaluator::new(&net, &fleet[0], 0),
///     RouteEvaluator::new(&net, &fleet[1], 1),
/// ];
///
/// // Each route crosses the depot; swapping fixes both.
/// let mut routes = vec![vec![1, 2], vec![3, 4]];
/// assert!(segment_exchange(&net, &evals, &mut routes, 2));
/// ```
pub fn segment_exchange(
    network: &RoutingNetwork,
    evaluators: &[RouteEvaluator<'_>],
    routes: &mut [Vec<usize>],
    max_len: usize,
) -> bool {
    if max_len == 0 {
        return false;
    }
    let loads: Vec<f64> = routes
        .iter()
        .map(|seq| seq.iter().map(|&n| network.demand(n)).sum())
        .collect();

    for r1 in 0..routes.len() {
        for r2 in (r1 + 1)..routes.len() {
            if routes[r1].is_empty() || routes[r2].is_empty() {
                continue;
            }
            if let Some((new1, new2)) = first_exchange(
                network,
                (&evaluators[r1], routes[r1].as_slice(), loads[r1]),
                (&evaluators[r2], routes[r2].as_slice(), loads[r2]),
                max_len,
            ) {
                routes[r1] = new1;
                routes[r2] = new2;
                return true;
            }
        }
    }
    false
}

type Side<'e, 'a, 's> = (&'e RouteEvaluator<'a>, &'s [usize], f64);

/// Scans segment pairs of two routes and returns the first improving,
/// feasible exchange as the two new sequences.
fn first_exchange(
    network: &RoutingNetwork,
    (eval1, seq1, load1): Side<'_, '_, '_>,
    (eval2, seq2, load2): Side<'_, '_, '_>,
    max_len: usize,
) -> Option<(Vec<usize>, Vec<usize>)> {
    let (v1, v2) = (eval1.vehicle(), eval2.vehicle());
    let (rate1, rate2) = (v1.cost_per_distance(), v2.cost_per_distance());

    for i in 0..seq1.len() {
        for len1 in 1..=max_len.min(seq1.len() - i) {
            let seg1 = &seq1[i..i + len1];
            let demand1: f64 = seg1.iter().map(|&n| network.demand(n)).sum();

            for j in 0..seq2.len() {
                for len2 in 1..=max_len.min(seq2.len() - j) {
                    let seg2 = &seq2[j..j + len2];
                    let demand2: f64 = seg2.iter().map(|&n| network.demand(n)).sum();
                    if load1 - demand1 + demand2 > v1.capacity() + LOAD_EPS
                        || load2 - demand2 + demand1 > v2.capacity() + LOAD_EPS
                    {
                        continue;
                    }

                    let delta = replace_delta(network, seq1, i, len1, seg2) * rate1
                        + replace_delta(network, seq2, j, len2, seg1) * rate2;
                    if delta >= -IMPROVEMENT_EPS {
                        continue;
                    }

                    let new1 = splice(seq1, i, len1, seg2);
                    if !eval1.is_feasible(&new1) {
                        continue;
                    }
                    let new2 = splice(seq2, j, len2, seg1);
                    if !eval2.is_feasible(&new2) {
                        continue;
                    }
                    return Some((new1, new2));
                }
            }
        }
    }
    None
}

/// `seq` with `seq[start..start + len]` replaced by `segment`.
fn splice(seq: &[usize], start: usize, len: usize, segment: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(seq.len() - len + segment.len());
    out.extend_from_slice(&seq[..start]);
    out.extend_from_slice(segment);
    out.extend_from_slice(&seq[start + len..]);
    out
}
