//! Local search operators for improving route sets.
//!
//! - [`relocate_intra`] — Move one customer within its route
//! - [`relocate_inter`] — Move one customer into another route
//! - [`segment_exchange`] — Swap short segments between two routes
//!
//! Every operator applies the first move that strictly lowers cost while
//! keeping all hard constraints, and reports whether it moved anything.

mod exchange;
mod relocate;

use serde::{Deserialize, Serialize};

use crate::evaluation::RouteEvaluator;
use crate::models::RoutingNetwork;

pub use exchange::segment_exchange;
pub use relocate::{relocate_inter, relocate_intra};

/// A move must lower cost by more than this to be accepted.
pub(crate) const IMPROVEMENT_EPS: f64 = 1e-9;

/// Neighborhoods in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Neighborhood {
    IntraRelocate,
    InterRelocate,
    SegmentExchange,
}

impl Neighborhood {
    /// Fixed scan order.
    pub const ORDER: [Neighborhood; 3] = [
        Neighborhood::IntraRelocate,
        Neighborhood::InterRelocate,
        Neighborhood::SegmentExchange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntraRelocate => "intra-relocate",
            Self::InterRelocate => "inter-relocate",
            Self::SegmentExchange => "segment-exchange",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|n| n.as_str() == s)
    }
}

/// Tries the neighborhoods in [`Neighborhood::ORDER`] and applies the first
/// improving move found. Returns the neighborhood that moved, or `None` at a
/// local optimum.
pub fn improve_once(
    network: &RoutingNetwork,
    evaluators: &[RouteEvaluator<'_>],
    routes: &mut [Vec<usize>],
    max_segment_len: usize,
) -> Option<Neighborhood> {
    Neighborhood::ORDER.into_iter().find(|hood| match hood {
        Neighborhood::IntraRelocate => relocate_intra(network, evaluators, routes),
        Neighborhood::InterRelocate => relocate_inter(network, evaluators, routes),
        Neighborhood::SegmentExchange => {
            segment_exchange(network, evaluators, routes, max_segment_len)
        }
    })
}

/// Distance of `prev → mid… → next`.
fn path_len(network: &RoutingNetwork, prev: usize, mid: &[usize], next: usize) -> f64 {
    let mut total = 0.0;
    let mut at = prev;
    for &node in mid {
        total += network.distance(at, node);
        at = node;
    }
    total + network.distance(at, next)
}

/// Distance change from replacing `seq[start..start + len]` with `segment`.
pub(crate) fn replace_delta(
    network: &RoutingNetwork,
    seq: &[usize],
    start: usize,
    len: usize,
    segment: &[usize],
) -> f64 {
    let prev = if start == 0 { 0 } else { seq[start - 1] };
    let next = seq.get(start + len).copied().unwrap_or(0);
    path_len(network, prev, segment, next) - path_len(network, prev, &seq[start..start + len], next)
}

/// Distance change from removing `seq[pos]`.
pub(crate) fn removal_delta(network: &RoutingNetwork, seq: &[usize], pos: usize) -> f64 {
    replace_delta(network, seq, pos, 1, &[])
}
