//! The pluggable solving strategy behind the MILP engines.

use serde::{Deserialize, Serialize};

use crate::error::SolveError;
use crate::quota::SolveContext;

use super::MilpModel;

/// Stopping rules passed to a backend alongside the model.
///
/// The wall-clock deadline and cancellation travel in the
/// [`SolveContext`]; these are the search-specific limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveLimits {
    /// Relative optimality gap at which the search may stop.
    pub relative_gap: f64,
    /// Maximum branch-and-bound nodes; 0 means unlimited.
    pub max_nodes: u64,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            relative_gap: 0.01,
            max_nodes: 0,
        }
    }
}

/// What a backend knows about the model after it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilpStatus {
    /// Best solution proven within the requested gap.
    Optimal,
    /// A feasible solution without the optimality proof.
    Feasible,
    /// No feasible solution exists.
    Infeasible,
    /// The objective is unbounded below.
    Unbounded,
    /// Stopped before any feasible solution was found.
    NoSolution,
}

/// Why the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    /// The search space was fully explored.
    Completed,
    /// Parts of the tree were closed by the relative gap.
    GapReached,
    /// The deadline passed or the solve was cancelled.
    TimeLimit,
    /// The node limit was hit.
    NodeLimit,
}

impl TerminationReason {
    /// Returns `true` when the search stopped before it was finished.
    pub fn is_early(&self) -> bool {
        matches!(self, Self::TimeLimit | Self::NodeLimit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::GapReached => "gap-reached",
            Self::TimeLimit => "time-limit",
            Self::NodeLimit => "node-limit",
        }
    }
}

/// Result of a backend solve.
#[derive(Debug, Clone, PartialEq)]
pub struct MilpOutcome {
    pub status: MilpStatus,
    pub termination: TerminationReason,
    /// One value per model variable, when a solution exists.
    pub values: Option<Vec<f64>>,
    /// Objective of `values`.
    pub objective: Option<f64>,
    /// Best proven lower bound, if known.
    pub best_bound: Option<f64>,
    /// Branch-and-bound nodes processed.
    pub nodes: u64,
}

impl MilpOutcome {
    /// Relative gap between the objective and the best bound.
    pub fn gap(&self) -> Option<f64> {
        let (obj, bound) = (self.objective?, self.best_bound?);
        Some(((obj - bound) / obj.abs().max(1e-9)).max(0.0))
    }
}

/// A MILP solving strategy.
///
/// Implementations receive a complete model and must honour the context's
/// quota: once it is reached they return the best solution found so far
/// with [`TerminationReason::TimeLimit`] instead of an error. Errors are
/// reserved for internal faults and map to [`SolveError::SolverFailure`].
pub trait MilpBackend: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Solves `model` to minimize its objective.
    fn solve(
        &self,
        model: &MilpModel,
        limits: &SolveLimits,
        ctx: &SolveContext,
    ) -> Result<MilpOutcome, SolveError>;
}
