//! Capacitated routing with time windows.
//!
//! [`VrpRunner`] builds routes with
//! [`cheapest_insertion`](crate::constructive::cheapest_insertion) and
//! improves them with the [`local_search`](crate::local_search) operators
//! until no move improves, the move budget is spent or the deadline passes.

mod config;
mod runner;

pub use config::VrpConfig;
pub use runner::{MoveCount, VrpResult, VrpRunner, VrpTermination};
