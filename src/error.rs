//! Error kinds shared by every engine.

use thiserror::Error;

/// A failure raised while validating or solving a problem instance.
///
/// Engines return these through `Result`; the [`Solver`](crate::solver::Solver)
/// turns them into a typed status inside the solution envelope so that no
/// error ever escapes the public entry point.
///
/// Hitting the time limit is not an error: it is reported as
/// [`SolveStatus::TimeLimitReached`](crate::envelope::SolveStatus) together
/// with the best solution found.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    /// The instance is malformed or inconsistent; no engine was run.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Distance data failed validation.
    #[error("malformed distance matrix: {0}")]
    MalformedMatrix(String),

    /// The problem has no feasible solution under the given constraints.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// The underlying solving strategy reported an internal fault.
    #[error("solver failure: {0}")]
    SolverFailure(String),
}

impl SolveError {
    /// Shorthand for [`SolveError::InvalidInput`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Shorthand for [`SolveError::MalformedMatrix`].
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMatrix(msg.into())
    }

    /// Shorthand for [`SolveError::Infeasible`].
    pub fn infeasible(msg: impl Into<String>) -> Self {
        Self::Infeasible(msg.into())
    }

    /// Shorthand for [`SolveError::SolverFailure`].
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::SolverFailure(msg.into())
    }
}
