//! Mixed-integer linear programming behind a backend-neutral interface.
//!
//! Engines build a [`MilpModel`] and hand it to any [`MilpBackend`]:
//!
//! - [`BranchAndBound`] — built-in LP-based branch-and-bound over a dense
//!   two-phase simplex
//! - `HighsBackend` — the HiGHS solver (feature `highs`)
//!
//! The built-in backend keeps a dense tableau and suits instances of a few
//! dozen sites and customers. Enable `highs` and pass `HighsBackend` to
//! [`Solver::with_backend`](crate::solver::Solver::with_backend) for anything
//! larger.

mod backend;
mod branch_bound;
#[cfg(feature = "highs")]
mod highs;
mod model;
mod simplex;

pub use backend::{MilpBackend, MilpOutcome, MilpStatus, SolveLimits, TerminationReason};
pub use branch_bound::BranchAndBound;
#[cfg(feature = "highs")]
pub use highs::HighsBackend;
pub use model::{Comparison, Constraint, MilpModel, VarId, VarKind, Variable};
