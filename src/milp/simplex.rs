//! Dense two-phase primal simplex for the LP relaxations of a [`MilpModel`].
//!
//! # Algorithm
//!
//! Variables are shifted to their lower bounds (`x = l + x'`), fixed
//! variables (`l == u`) are substituted out, and finite upper bounds become
//! `x' ≤ u − l` rows unless another row already implies them. Phase 1
//! minimizes the sum of artificial variables to find a basic feasible
//! solution; phase 2 minimizes the model objective from there.
//!
//! Entering columns follow Dantzig's rule (most negative reduced cost);
//! after a run of degenerate pivots the search switches to Bland's rule,
//! which cannot cycle.
//!
//! # Complexity
//!
//! Each pivot is O(m · n) on an m × n tableau.
//!
//! # Reference
//!
//! Chvátal, V. (1983). *Linear Programming*, W.H. Freeman, ch. 2-3 and 8.

use crate::error::SolveError;
use crate::quota::SolveContext;

use super::{Comparison, MilpModel};

const PIVOT_EPS: f64 = 1e-9;
const COST_EPS: f64 = 1e-9;
const FEAS_EPS: f64 = 1e-7;
const DEGENERATE_RUN: usize = 50;
const STOP_CHECK_EVERY: usize = 64;

/// Result of one LP solve.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LpOutcome {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
    /// The quota was reached mid-solve.
    Stopped,
}

enum PhaseEnd {
    Optimal,
    Unbounded,
    Stopped,
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    /// Reduced costs; the last entry is minus the objective.
    obj: Vec<f64>,
    width: usize,
}

impl Tableau {
    fn rhs(&self, i: usize) -> f64 {
        self.rows[i][self.width]
    }

    fn set_costs(&mut self, costs: &[f64]) {
        let mut obj = vec![0.0; self.width + 1];
        obj[..self.width].copy_from_slice(costs);
        for (i, row) in self.rows.iter().enumerate() {
            let cb = costs[self.basis[i]];
            if cb != 0.0 {
                for (o, &t) in obj.iter_mut().zip(row) {
                    *o -= cb * t;
                }
            }
        }
        self.obj = obj;
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let inv = 1.0 / self.rows[r][c];
        for v in self.rows[r].iter_mut() {
            *v *= inv;
        }
        let pivot_row = std::mem::take(&mut self.rows[r]);
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r {
                continue;
            }
            let factor = row[c];
            if factor != 0.0 {
                for (v, &p) in row.iter_mut().zip(&pivot_row) {
                    *v -= factor * p;
                }
            }
        }
        let factor = self.obj[c];
        if factor != 0.0 {
            for (v, &p) in self.obj.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
        }
        self.rows[r] = pivot_row;
        self.basis[r] = c;
    }

    /// Runs primal simplex; only columns below `enterable` may enter.
    fn optimize(
        &mut self,
        enterable: usize,
        max_iterations: usize,
        ctx: &SolveContext,
    ) -> Result<PhaseEnd, SolveError> {
        let mut bland = false;
        let mut degenerate = 0;

        for iteration in 0..max_iterations {
            if iteration % STOP_CHECK_EVERY == 0 && ctx.is_stopped() {
                return Ok(PhaseEnd::Stopped);
            }

            let entering = if bland {
                (0..enterable).find(|&j| self.obj[j] < -COST_EPS)
            } else {
                (0..enterable)
                    .filter(|&j| self.obj[j] < -COST_EPS)
                    .min_by(|&a, &b| self.obj[a].total_cmp(&self.obj[b]))
            };
            let Some(col) = entering else {
                return Ok(PhaseEnd::Optimal);
            };

            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                let a = row[col];
                if a <= PIVOT_EPS {
                    continue;
                }
                let ratio = row[self.width] / a;
                let better = match leaving {
                    None => true,
                    Some((l, best)) => {
                        ratio < best - 1e-12
                            || (ratio <= best + 1e-12 && self.basis[i] < self.basis[l])
                    }
                };
                if better {
                    leaving = Some((i, ratio));
                }
            }
            let Some((row, ratio)) = leaving else {
                return Ok(PhaseEnd::Unbounded);
            };

            if ratio <= FEAS_EPS {
                degenerate += 1;
                bland |= degenerate > DEGENERATE_RUN;
            } else {
                degenerate = 0;
            }
            self.pivot(row, col);
        }
        Err(SolveError::failure(format!(
            "simplex did not converge within {max_iterations} pivots"
        )))
    }
}

/// Solves the LP relaxation of `model` with the variable bounds replaced by
/// `lower` and `upper`.
pub(crate) fn solve_relaxation(
    model: &MilpModel,
    lower: &[f64],
    upper: &[f64],
    ctx: &SolveContext,
) -> Result<LpOutcome, SolveError> {
    let vars = model.variables();
    let n = vars.len();
    if lower.iter().any(|l| !l.is_finite()) {
        return Err(SolveError::failure("variables need a finite lower bound"));
    }
    if lower.iter().zip(upper).any(|(l, u)| l > &(u + FEAS_EPS)) {
        return Ok(LpOutcome::Infeasible);
    }

    // Free (non-fixed) variables become tableau columns.
    let mut column_of = vec![None; n];
    let mut var_of = Vec::new();
    for j in 0..n {
        if upper[j] - lower[j] > 1e-12 {
            column_of[j] = Some(var_of.len());
            var_of.push(j);
        }
    }
    let w = var_of.len();

    // Shifted structural rows.
    let mut rows: Vec<(Vec<f64>, Comparison, f64)> = Vec::new();
    for c in model.constraints() {
        let mut coefs = vec![0.0; w];
        let mut rhs = c.rhs;
        for &(id, a) in &c.terms {
            let j = id.index();
            rhs -= a * lower[j];
            if let Some(k) = column_of[j] {
                coefs[k] += a;
            }
        }
        if coefs.iter().all(|&a| a == 0.0) {
            let slack = FEAS_EPS * c.rhs.abs().max(1.0);
            let violated = match c.cmp {
                Comparison::LessEq => rhs < -slack,
                Comparison::GreaterEq => rhs > slack,
                Comparison::Equal => rhs.abs() > slack,
            };
            if violated {
                return Ok(LpOutcome::Infeasible);
            }
            continue;
        }
        rows.push((coefs, c.cmp, rhs));
    }

    // Upper bounds not already implied by a nonnegative packing row.
    let mut implied = vec![f64::INFINITY; w];
    for (coefs, cmp, rhs) in &rows {
        if *cmp == Comparison::GreaterEq || *rhs < 0.0 || coefs.iter().any(|&a| a < 0.0) {
            continue;
        }
        for (k, &a) in coefs.iter().enumerate() {
            if a > 0.0 {
                implied[k] = implied[k].min(rhs / a);
            }
        }
    }
    for (k, &j) in var_of.iter().enumerate() {
        let span = upper[j] - lower[j];
        if span.is_finite() && implied[k] > span + FEAS_EPS {
            let mut coefs = vec![0.0; w];
            coefs[k] = 1.0;
            rows.push((coefs, Comparison::LessEq, span));
        }
    }

    // Nonnegative right-hand sides.
    for (coefs, cmp, rhs) in rows.iter_mut() {
        if *rhs < 0.0 {
            coefs.iter_mut().for_each(|a| *a = -*a);
            *rhs = -*rhs;
            *cmp = match *cmp {
                Comparison::LessEq => Comparison::GreaterEq,
                Comparison::GreaterEq => Comparison::LessEq,
                Comparison::Equal => Comparison::Equal,
            };
        }
    }

    let m = rows.len();
    let slacks = rows.iter().filter(|r| r.1 != Comparison::Equal).count();
    let artificials = rows.iter().filter(|r| r.1 != Comparison::LessEq).count();
    let art_start = w + slacks;
    let width = art_start + artificials;

    let mut table = Vec::with_capacity(m);
    let mut basis = Vec::with_capacity(m);
    let (mut next_slack, mut next_art) = (w, art_start);
    for (coefs, cmp, rhs) in rows {
        let mut row = vec![0.0; width + 1];
        row[..w].copy_from_slice(&coefs);
        row[width] = rhs;
        match cmp {
            Comparison::LessEq => {
                row[next_slack] = 1.0;
                basis.push(next_slack);
                next_slack += 1;
            }
            Comparison::GreaterEq => {
                row[next_slack] = -1.0;
                next_slack += 1;
                row[next_art] = 1.0;
                basis.push(next_art);
                next_art += 1;
            }
            Comparison::Equal => {
                row[next_art] = 1.0;
                basis.push(next_art);
                next_art += 1;
            }
        }
        table.push(row);
    }

    let mut tab = Tableau {
        rows: table,
        basis,
        obj: Vec::new(),
        width,
    };
    let max_iterations = 10_000 + 50 * (m + width);

    if artificials > 0 {
        let mut phase1 = vec![0.0; width];
        phase1[art_start..].iter_mut().for_each(|c| *c = 1.0);
        tab.set_costs(&phase1);
        match tab.optimize(width, max_iterations, ctx)? {
            PhaseEnd::Stopped => return Ok(LpOutcome::Stopped),
            PhaseEnd::Unbounded => {
                return Err(SolveError::failure("phase 1 reported an unbounded ray"))
            }
            PhaseEnd::Optimal => {}
        }
        let scale = (0..m).map(|i| tab.rhs(i).abs()).fold(1.0, f64::max);
        if -tab.obj[width] > FEAS_EPS * scale {
            return Ok(LpOutcome::Infeasible);
        }
        // Drive remaining artificials out of the basis where possible.
        for i in 0..m {
            if tab.basis[i] >= art_start {
                if let Some(j) = (0..art_start).find(|&j| tab.rows[i][j].abs() > PIVOT_EPS) {
                    tab.pivot(i, j);
                }
            }
        }
    }

    let mut costs = vec![0.0; width];
    for (k, &j) in var_of.iter().enumerate() {
        costs[k] = vars[j].cost;
    }
    tab.set_costs(&costs);
    match tab.optimize(art_start, max_iterations, ctx)? {
        PhaseEnd::Stopped => return Ok(LpOutcome::Stopped),
        PhaseEnd::Unbounded => return Ok(LpOutcome::Unbounded),
        PhaseEnd::Optimal => {}
    }

    let mut values = lower.to_vec();
    for (i, &b) in tab.basis.iter().enumerate() {
        if b < w {
            values[var_of[b]] += tab.rhs(i).max(0.0);
        }
    }
    let objective = model.objective_value(&values);
    Ok(LpOutcome::Optimal { values, objective })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::VarKind;

    fn bounds(model: &MilpModel) -> (Vec<f64>, Vec<f64>) {
        model
            .variables()
            .iter()
            .map(|v| (v.lower, v.upper))
            .unzip()
    }

    fn solve(model: &MilpModel) -> LpOutcome {
        let (lo, up) = bounds(model);
        solve_relaxation(model, &lo, &up, &SolveContext::unbounded()).expect("no fault")
    }

    fn optimum(outcome: LpOutcome) -> (Vec<f64>, f64) {
        match outcome {
            LpOutcome::Optimal { values, objective } => (values, objective),
            other => panic!("expected optimum, got {other:?}"),
        }
    }

    #[test]
    fn test_textbook_maximization() {
        // max x + y  s.t.  x + 2y <= 4, 3x + y <= 6
        let mut m = MilpModel::new("lp");
        let x = m.add_continuous("x", 0.0, f64::INFINITY, -1.0);
        let y = m.add_continuous("y", 0.0, f64::INFINITY, -1.0);
        m.add_constraint("a", vec![(x, 1.0), (y, 2.0)], Comparison::LessEq, 4.0);
        m.add_constraint("b", vec![(x, 3.0), (y, 1.0)], Comparison::LessEq, 6.0);
        let (values, obj) = optimum(solve(&m));
        assert!((values[0] - 1.6).abs() < 1e-7);
        assert!((values[1] - 1.2).abs() < 1e-7);
        assert!((obj + 2.8).abs() < 1e-7);
    }

    #[test]
    fn test_phase_one_with_equality_and_cover() {
        // min 2x + 3y  s.t.  x + y = 10, x >= 3, y >= 2 (as rows)
        let mut m = MilpModel::new("lp");
        let x = m.add_continuous("x", 0.0, f64::INFINITY, 2.0);
        let y = m.add_continuous("y", 0.0, f64::INFINITY, 3.0);
        m.add_constraint("sum", vec![(x, 1.0), (y, 1.0)], Comparison::Equal, 10.0);
        m.add_constraint("x", vec![(x, 1.0)], Comparison::GreaterEq, 3.0);
        m.add_constraint("y", vec![(y, 1.0)], Comparison::GreaterEq, 2.0);
        let (values, obj) = optimum(solve(&m));
        assert!((values[0] - 8.0).abs() < 1e-7);
        assert!((values[1] - 2.0).abs() < 1e-7);
        assert!((obj - 22.0).abs() < 1e-7);
    }

    #[test]
    fn test_infeasible() {
        let mut m = MilpModel::new("lp");
        let x = m.add_continuous("x", 0.0, f64::INFINITY, 1.0);
        m.add_constraint("lo", vec![(x, 1.0)], Comparison::GreaterEq, 5.0);
        m.add_constraint("hi", vec![(x, 1.0)], Comparison::LessEq, 3.0);
        assert_eq!(solve(&m), LpOutcome::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        let mut m = MilpModel::new("lp");
        let x = m.add_continuous("x", 0.0, f64::INFINITY, -1.0);
        let y = m.add_continuous("y", 0.0, f64::INFINITY, 0.0);
        m.add_constraint("c", vec![(x, 1.0), (y, -1.0)], Comparison::LessEq, 1.0);
        assert_eq!(solve(&m), LpOutcome::Unbounded);
    }

    #[test]
    fn test_variable_bounds_respected() {
        // max x with 2 <= x <= 7 and no rows.
        let mut m = MilpModel::new("lp");
        let _ = m.add_continuous("x", 2.0, 7.0, -1.0);
        let (values, obj) = optimum(solve(&m));
        assert!((values[0] - 7.0).abs() < 1e-7);
        assert!((obj + 7.0).abs() < 1e-7);
    }

    #[test]
    fn test_fixed_variables_substituted() {
        // x fixed at 1 forces y >= 3 through x + y >= 4.
        let mut m = MilpModel::new("lp");
        let x = m.add_variable("x", VarKind::Binary, 0.0, 1.0, 5.0);
        let y = m.add_continuous("y", 0.0, 10.0, 1.0);
        m.add_constraint("c", vec![(x, 1.0), (y, 1.0)], Comparison::GreaterEq, 4.0);
        let lo = vec![1.0, 0.0];
        let up = vec![1.0, 10.0];
        let outcome = solve_relaxation(&m, &lo, &up, &SolveContext::unbounded()).expect("no fault");
        let (values, obj) = optimum(outcome);
        assert_eq!(values[0], 1.0);
        assert!((values[1] - 3.0).abs() < 1e-7);
        assert!((obj - 8.0).abs() < 1e-7);
    }

    #[test]
    fn test_contradictory_fixing_is_infeasible() {
        let mut m = MilpModel::new("lp");
        let x = m.add_binary("x", 1.0);
        m.add_constraint("c", vec![(x, 1.0)], Comparison::GreaterEq, 1.0);
        let outcome =
            solve_relaxation(&m, &[0.0], &[0.0], &SolveContext::unbounded()).expect("no fault");
        assert_eq!(outcome, LpOutcome::Infeasible);
    }

    #[test]
    fn test_fractional_relaxation_of_knapsack() {
        // max 3a + 2b  s.t.  2a + 2b <= 3, a, b in [0, 1]
        let mut m = MilpModel::new("lp");
        let a = m.add_binary("a", -3.0);
        let b = m.add_binary("b", -2.0);
        m.add_constraint("w", vec![(a, 2.0), (b, 2.0)], Comparison::LessEq, 3.0);
        let (values, obj) = optimum(solve(&m));
        assert!((values[0] - 1.0).abs() < 1e-7);
        assert!((values[1] - 0.5).abs() < 1e-7);
        assert!((obj + 4.0).abs() < 1e-7);
    }

    #[test]
    fn test_redundant_equalities() {
        // The second row repeats the first; an artificial stays basic at zero.
        let mut m = MilpModel::new("lp");
        let x = m.add_continuous("x", 0.0, f64::INFINITY, 1.0);
        let y = m.add_continuous("y", 0.0, f64::INFINITY, 2.0);
        m.add_constraint("a", vec![(x, 1.0), (y, 1.0)], Comparison::Equal, 2.0);
        m.add_constraint("b", vec![(x, 2.0), (y, 2.0)], Comparison::Equal, 4.0);
        let (values, obj) = optimum(solve(&m));
        assert!((values[0] - 2.0).abs() < 1e-7);
        assert!((obj - 2.0).abs() < 1e-7);
    }
}
