//! LP-based branch-and-bound over the dense simplex.
//!
//! # Algorithm
//!
//! Each node is a box of variable bounds. Its LP relaxation gives a lower
//! bound; nodes whose bound cannot beat the incumbent by more than the
//! allowed gap are pruned. Otherwise the most fractional integer variable
//! is split into `x ≤ ⌊v⌋` and `x ≥ ⌈v⌉`.
//!
//! Node selection is depth-first (up branch first) until an incumbent
//! exists, then best-bound. A feasible warm start on the model seeds the
//! incumbent.
//!
//! # Reference
//!
//! Land, A.H. & Doig, A.G. (1960). "An Automatic Method of Solving Discrete
//! Programming Problems", *Econometrica* 28(3), 497-520.

use crate::error::SolveError;
use crate::quota::SolveContext;

use super::simplex::{solve_relaxation, LpOutcome};
use super::{MilpBackend, MilpModel, MilpOutcome, MilpStatus, SolveLimits, TerminationReason};

const INT_TOL: f64 = 1e-6;
const ABS_GAP: f64 = 1e-9;

/// Built-in exact backend: branch-and-bound on LP relaxations.
///
/// Dense and single-threaded; meant for instances with up to a few thousand
/// variables.
///
/// # Examples
///
/// ```
/// use u_netdesign::milp::{BranchAndBound, Comparison, MilpBackend, MilpModel, MilpStatus, SolveLimits};
/// use u_netdesign::quota::SolveContext;
///
/// // max 3a + 2b + 2c  s.t.  2a + 2b + 2c <= 4
/// let mut model = MilpModel::new("knapsack");
/// let a = model.add_binary("a", -3.0);
/// let b = model.add_binary("b", -2.0);
/// let c = model.add_binary("c", -2.0);
/// model.add_constraint("w", vec![(a, 2.0), (b, 2.0), (c, 2.0)], Comparison::LessEq, 4.0);
///
/// let limits = SolveLimits { relative_gap: 0.0, max_nodes: 0 };
/// let outcome = BranchAndBound::new()
///     .solve(&model, &limits, &SolveContext::unbounded())
///     .unwrap();
/// assert_eq!(outcome.status, MilpStatus::Optimal);
/// assert_eq!(outcome.objective, Some(-5.0));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBound;

impl BranchAndBound {
    pub fn new() -> Self {
        Self
    }
}

struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// Parent relaxation value.
    bound: f64,
}

struct Incumbent {
    values: Vec<f64>,
    objective: f64,
}

impl MilpBackend for BranchAndBound {
    fn name(&self) -> &str {
        "branch-and-bound"
    }

    fn solve(
        &self,
        model: &MilpModel,
        limits: &SolveLimits,
        ctx: &SolveContext,
    ) -> Result<MilpOutcome, SolveError> {
        let vars = model.variables();
        let gap = limits.relative_gap.max(0.0);
        let cutoff = |inc: &Incumbent| inc.objective - ABS_GAP.max(gap * inc.objective.abs());

        let mut incumbent = model
            .warm_start()
            .filter(|ws| model.is_feasible(ws, INT_TOL))
            .map(|ws| Incumbent {
                values: ws.to_vec(),
                objective: model.objective_value(ws),
            });
        if let Some(inc) = &incumbent {
            ctx.log(&format!("b&b: warm start incumbent {:.6}", inc.objective));
        }

        let mut open = vec![Node {
            lower: vars.iter().map(|v| v.lower).collect(),
            upper: vars.iter().map(|v| v.upper).collect(),
            bound: f64::NEG_INFINITY,
        }];
        let mut nodes = 0u64;
        let mut gap_closed: Option<f64> = None;
        let mut stopped: Option<TerminationReason> = None;
        let mut root_unbounded = false;

        while !open.is_empty() {
            if ctx.is_stopped() {
                stopped = Some(TerminationReason::TimeLimit);
                break;
            }
            if limits.max_nodes > 0 && nodes >= limits.max_nodes {
                stopped = Some(TerminationReason::NodeLimit);
                break;
            }

            let pick = match &incumbent {
                None => open.len() - 1,
                Some(_) => best_bound_index(&open),
            };
            let node = open.swap_remove(pick);

            if let Some(inc) = &incumbent {
                if node.bound >= cutoff(inc) {
                    note_gap_prune(&mut gap_closed, node.bound, inc);
                    continue;
                }
            }

            nodes += 1;
            let (values, objective) = match solve_relaxation(model, &node.lower, &node.upper, ctx)? {
                LpOutcome::Optimal { values, objective } => (values, objective),
                LpOutcome::Infeasible => continue,
                LpOutcome::Unbounded => {
                    if nodes == 1 {
                        root_unbounded = true;
                        break;
                    }
                    return Err(SolveError::failure("unbounded relaxation below the root"));
                }
                LpOutcome::Stopped => {
                    open.push(node);
                    stopped = Some(TerminationReason::TimeLimit);
                    break;
                }
            };

            if let Some(inc) = &incumbent {
                if objective >= cutoff(inc) {
                    note_gap_prune(&mut gap_closed, objective, inc);
                    continue;
                }
            }

            match most_fractional(model, &values) {
                None => {
                    let mut values = values;
                    for (x, v) in values.iter_mut().zip(vars) {
                        if v.kind.is_integral() {
                            *x = x.round();
                        }
                    }
                    let objective = model.objective_value(&values);
                    ctx.log(&format!("b&b: node {nodes} new incumbent {objective:.6}"));
                    incumbent = Some(Incumbent { values, objective });
                }
                Some((j, v)) => {
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                        bound: objective,
                    };
                    down.upper[j] = v.floor();
                    let mut up = Node {
                        lower: node.lower,
                        upper: node.upper,
                        bound: objective,
                    };
                    up.lower[j] = v.ceil();
                    open.push(down);
                    open.push(up);
                }
            }
        }

        if root_unbounded {
            return Ok(MilpOutcome {
                status: MilpStatus::Unbounded,
                termination: TerminationReason::Completed,
                values: None,
                objective: None,
                best_bound: None,
                nodes,
            });
        }

        let open_bound = open.iter().map(|n| n.bound).fold(f64::INFINITY, f64::min);
        ctx.log(&format!("b&b: {nodes} nodes, {} open", open.len()));

        let outcome = match (incumbent, stopped) {
            (Some(inc), None) => MilpOutcome {
                status: MilpStatus::Optimal,
                termination: if gap_closed.is_some() {
                    TerminationReason::GapReached
                } else {
                    TerminationReason::Completed
                },
                best_bound: Some(gap_closed.map_or(inc.objective, |b| b.min(inc.objective))),
                objective: Some(inc.objective),
                values: Some(inc.values),
                nodes,
            },
            (Some(inc), Some(reason)) => MilpOutcome {
                status: MilpStatus::Feasible,
                termination: reason,
                best_bound: Some(
                    gap_closed
                        .unwrap_or(f64::INFINITY)
                        .min(open_bound)
                        .min(inc.objective),
                ),
                objective: Some(inc.objective),
                values: Some(inc.values),
                nodes,
            },
            (None, None) => MilpOutcome {
                status: MilpStatus::Infeasible,
                termination: TerminationReason::Completed,
                values: None,
                objective: None,
                best_bound: None,
                nodes,
            },
            (None, Some(reason)) => MilpOutcome {
                status: MilpStatus::NoSolution,
                termination: reason,
                values: None,
                objective: None,
                best_bound: open_bound.is_finite().then_some(open_bound),
                nodes,
            },
        };
        Ok(outcome)
    }
}

/// Records a node closed only thanks to the relative gap.
fn note_gap_prune(gap_closed: &mut Option<f64>, bound: f64, inc: &Incumbent) {
    if bound < inc.objective - ABS_GAP {
        *gap_closed = Some(gap_closed.map_or(bound, |b: f64| b.min(bound)));
    }
}

fn best_bound_index(open: &[Node]) -> usize {
    open.iter()
        .enumerate()
        .min_by(|a, b| a.1.bound.total_cmp(&b.1.bound))
        .map_or(0, |(i, _)| i)
}

/// Integer variable whose value is farthest from integral, with its value.
fn most_fractional(model: &MilpModel, values: &[f64]) -> Option<(usize, f64)> {
    model
        .variables()
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(_, (v, _))| v.kind.is_integral())
        .map(|(j, (_, &x))| (j, x, (x - x.floor()).min(x.ceil() - x)))
        .filter(|&(_, _, frac)| frac > INT_TOL)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(j, x, _)| (j, x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::{Comparison, VarKind};
    use crate::quota::TimeQuota;
    use crate::telemetry::silent_logger;
    use std::sync::Arc;

    fn exact() -> SolveLimits {
        SolveLimits {
            relative_gap: 0.0,
            max_nodes: 0,
        }
    }

    fn knapsack() -> MilpModel {
        // max 10a + 7b + 6c + 4d  s.t.  5a + 4b + 3c + 2d <= 9
        let mut m = MilpModel::new("knapsack");
        let ids: Vec<_> = [(10.0, 5.0), (7.0, 4.0), (6.0, 3.0), (4.0, 2.0)]
            .iter()
            .enumerate()
            .map(|(i, &(value, weight))| (m.add_binary(format!("x{i}"), -value), weight))
            .collect();
        m.add_constraint("w", ids, Comparison::LessEq, 9.0);
        m
    }

    #[test]
    fn test_knapsack_optimum() {
        let m = knapsack();
        let out = BranchAndBound::new()
            .solve(&m, &exact(), &SolveContext::unbounded())
            .expect("solved");
        assert_eq!(out.status, MilpStatus::Optimal);
        assert_eq!(out.termination, TerminationReason::Completed);
        // a + b and b + c + d both reach 17.
        assert!((out.objective.expect("objective") + 17.0).abs() < 1e-9);
        let values = out.values.expect("values");
        assert!(m.is_feasible(&values, 1e-6));
    }

    #[test]
    fn test_infeasible_integer_program() {
        // 2x = 3 has no integer solution.
        let mut m = MilpModel::new("odd");
        let x = m.add_variable("x", VarKind::Integer, 0.0, 10.0, 1.0);
        m.add_constraint("c", vec![(x, 2.0)], Comparison::Equal, 3.0);
        let out = BranchAndBound::new()
            .solve(&m, &exact(), &SolveContext::unbounded())
            .expect("solved");
        assert_eq!(out.status, MilpStatus::Infeasible);
        assert!(out.values.is_none());
    }

    #[test]
    fn test_general_integer_branching() {
        // max x + y  s.t.  2x + 2y <= 7, x <= 2.5
        let mut m = MilpModel::new("int");
        let x = m.add_variable("x", VarKind::Integer, 0.0, 10.0, -1.0);
        let y = m.add_variable("y", VarKind::Integer, 0.0, 10.0, -1.0);
        m.add_constraint("c", vec![(x, 2.0), (y, 2.0)], Comparison::LessEq, 7.0);
        m.add_constraint("x", vec![(x, 1.0)], Comparison::LessEq, 2.5);
        let out = BranchAndBound::new()
            .solve(&m, &exact(), &SolveContext::unbounded())
            .expect("solved");
        assert!((out.objective.expect("objective") + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_warm_start_seeds_incumbent() {
        let mut m = knapsack();
        m.set_warm_start(vec![0.0, 1.0, 1.0, 1.0]);
        let out = BranchAndBound::new()
            .solve(&m, &exact(), &SolveContext::unbounded())
            .expect("solved");
        assert!((out.objective.expect("objective") + 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_warm_start_ignored() {
        let mut m = knapsack();
        m.set_warm_start(vec![1.0, 1.0, 1.0, 1.0]);
        let out = BranchAndBound::new()
            .solve(&m, &exact(), &SolveContext::unbounded())
            .expect("solved");
        assert!((out.objective.expect("objective") + 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_expired_quota_keeps_warm_start() {
        let mut m = knapsack();
        m.set_warm_start(vec![1.0, 0.0, 0.0, 1.0]);
        let ctx = SolveContext::new(Arc::new(TimeQuota::new(0.0)), silent_logger());
        let out = BranchAndBound::new().solve(&m, &exact(), &ctx).expect("solved");
        assert_eq!(out.status, MilpStatus::Feasible);
        assert_eq!(out.termination, TerminationReason::TimeLimit);
        assert!((out.objective.expect("objective") + 14.0).abs() < 1e-9);
        assert_eq!(out.nodes, 0);
    }

    #[test]
    fn test_expired_quota_without_incumbent() {
        let m = knapsack();
        let ctx = SolveContext::new(Arc::new(TimeQuota::new(0.0)), silent_logger());
        let out = BranchAndBound::new().solve(&m, &exact(), &ctx).expect("solved");
        assert_eq!(out.status, MilpStatus::NoSolution);
        assert!(out.values.is_none());
    }

    #[test]
    fn test_node_limit() {
        let m = knapsack();
        let limits = SolveLimits {
            relative_gap: 0.0,
            max_nodes: 1,
        };
        let out = BranchAndBound::new()
            .solve(&m, &limits, &SolveContext::unbounded())
            .expect("solved");
        assert_eq!(out.termination, TerminationReason::NodeLimit);
        assert_eq!(out.nodes, 1);
    }

    #[test]
    fn test_loose_gap_accepts_warm_start() {
        let mut m = knapsack();
        // 16 is within 10% of the optimum 17.
        m.set_warm_start(vec![1.0, 0.0, 1.0, 0.0]);
        let limits = SolveLimits {
            relative_gap: 0.10,
            max_nodes: 0,
        };
        let out = BranchAndBound::new()
            .solve(&m, &limits, &SolveContext::unbounded())
            .expect("solved");
        assert_eq!(out.status, MilpStatus::Optimal);
        let obj = out.objective.expect("objective");
        assert!(obj <= -16.0 + 1e-9);
        let gap = out.gap().expect("bound known");
        assert!(gap <= 0.10 + 1e-9);
    }

    #[test]
    fn test_unbounded_integer_program() {
        let mut m = MilpModel::new("free");
        let x = m.add_variable("x", VarKind::Integer, 0.0, f64::INFINITY, -1.0);
        let y = m.add_continuous("y", 0.0, f64::INFINITY, 0.0);
        m.add_constraint("c", vec![(x, 1.0), (y, -1.0)], Comparison::LessEq, 0.5);
        let out = BranchAndBound::new()
            .solve(&m, &exact(), &SolveContext::unbounded())
            .expect("solved");
        assert_eq!(out.status, MilpStatus::Unbounded);
    }
}
