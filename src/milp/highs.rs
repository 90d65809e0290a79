//! HiGHS backend (feature `highs`).

use highs::{Col, HighsModelStatus, RowProblem, Sense};

use crate::error::SolveError;
use crate::quota::SolveContext;

use super::{
    Comparison, MilpBackend, MilpModel, MilpOutcome, MilpStatus, SolveLimits, TerminationReason,
};

const FEAS_TOL: f64 = 1e-6;

/// Hands the model to the HiGHS MIP solver.
///
/// HiGHS only sees the wall-clock limit left in the context when the solve
/// starts; a cancellation flag raised later is not observed mid-solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend {
    /// Worker threads HiGHS may use; 0 lets it decide.
    pub threads: u32,
}

impl HighsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }
}

impl MilpBackend for HighsBackend {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(
        &self,
        model: &MilpModel,
        limits: &SolveLimits,
        ctx: &SolveContext,
    ) -> Result<MilpOutcome, SolveError> {
        let mut pb = RowProblem::new();
        let cols: Vec<Col> = model
            .variables()
            .iter()
            .map(|v| {
                if v.kind.is_integral() {
                    pb.add_integer_column(v.cost, v.lower..=v.upper)
                } else {
                    pb.add_column(v.cost, v.lower..=v.upper)
                }
            })
            .collect();
        for c in model.constraints() {
            let terms: Vec<(Col, f64)> = c.terms.iter().map(|&(id, a)| (cols[id.index()], a)).collect();
            match c.cmp {
                Comparison::LessEq => pb.add_row(..=c.rhs, terms),
                Comparison::GreaterEq => pb.add_row(c.rhs.., terms),
                Comparison::Equal => pb.add_row(c.rhs..=c.rhs, terms),
            }
        }

        let mut highs = pb.optimise(Sense::Minimise);
        highs.make_quiet();
        highs.set_option("mip_rel_gap", limits.relative_gap.max(0.0));
        if let Some(left) = ctx.remaining() {
            highs.set_option("time_limit", left.as_secs_f64().max(1e-3));
        }
        if limits.max_nodes > 0 {
            highs.set_option("mip_max_nodes", i32::try_from(limits.max_nodes).unwrap_or(i32::MAX));
        }
        if self.threads > 0 {
            highs.set_option("threads", i32::try_from(self.threads).unwrap_or(i32::MAX));
        }

        ctx.log(&format!(
            "highs: {} columns, {} rows",
            cols.len(),
            model.constraints().len()
        ));
        let solved = highs
            .try_solve()
            .map_err(|status| SolveError::failure(format!("highs: {status:?}")))?;
        let status = solved.status();
        ctx.log(&format!("highs: {status:?}"));

        let values = || {
            let sol = solved.get_solution();
            let values = sol.columns().to_vec();
            model.is_feasible(&values, FEAS_TOL).then_some(values)
        };
        let outcome = |status: MilpStatus, termination: TerminationReason, values: Option<Vec<f64>>| {
            let objective = values.as_deref().map(|v| model.objective_value(v));
            MilpOutcome {
                status,
                termination,
                best_bound: if status == MilpStatus::Optimal { objective } else { None },
                objective,
                values,
                nodes: 0,
            }
        };

        Ok(match status {
            HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => match values() {
                Some(v) => outcome(MilpStatus::Optimal, TerminationReason::Completed, Some(v)),
                None => return Err(SolveError::failure("highs reported an infeasible optimum")),
            },
            HighsModelStatus::Infeasible => {
                outcome(MilpStatus::Infeasible, TerminationReason::Completed, None)
            }
            HighsModelStatus::Unbounded => {
                outcome(MilpStatus::Unbounded, TerminationReason::Completed, None)
            }
            HighsModelStatus::UnboundedOrInfeasible => {
                outcome(unbounded_or_infeasible(model), TerminationReason::Completed, None)
            }
            HighsModelStatus::ReachedTimeLimit | HighsModelStatus::ReachedIterationLimit => {
                let termination = if status == HighsModelStatus::ReachedTimeLimit {
                    TerminationReason::TimeLimit
                } else {
                    TerminationReason::NodeLimit
                };
                match values() {
                    Some(v) => outcome(MilpStatus::Feasible, termination, Some(v)),
                    None => outcome(MilpStatus::NoSolution, termination, None),
                }
            }
            other => return Err(SolveError::failure(format!("highs: {other:?}"))),
        })
    }
}

/// A model whose variables are all boxed cannot be unbounded.
fn unbounded_or_infeasible(model: &MilpModel) -> MilpStatus {
    let boxed = model
        .variables()
        .iter()
        .all(|v| v.lower.is_finite() && v.upper.is_finite());
    if boxed {
        MilpStatus::Infeasible
    } else {
        MilpStatus::Unbounded
    }
}
