//! Constructive heuristics for building initial route sets.
//!
//! - [`cheapest_insertion`] — Global cheapest insertion with hard capacity,
//!   time-window and route-limit feasibility, fleet-aware, O(n³m)

mod insertion;

pub(crate) use insertion::insertion_delta;
pub use insertion::{cheapest_insertion, Construction, TieBreak};
