//! Backend-neutral MILP model.
//!
//! An engine describes its problem here (variables, linear constraints,
//! a linear objective to minimize) and hands the model to any
//! [`MilpBackend`](super::MilpBackend). Backends answer with variable values
//! indexed by [`VarId`].

/// Handle of a variable inside one [`MilpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Position of the variable in [`MilpModel::variables`].
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Integer,
    /// Integer restricted to {0, 1}.
    Binary,
}

impl VarKind {
    pub fn is_integral(&self) -> bool {
        !matches!(self, Self::Continuous)
    }
}

/// A decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    /// `f64::INFINITY` for no upper bound.
    pub upper: f64,
    /// Objective coefficient.
    pub cost: f64,
}

/// Relation between the left-hand side and the right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessEq,
    Equal,
    GreaterEq,
}

/// A linear constraint `Σ coef·x (cmp) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub cmp: Comparison,
    pub rhs: f64,
}

/// A minimization MILP.
///
/// # Examples
///
/// ```
/// use u_netdesign::milp::{Comparison, MilpModel};
///
/// let mut model = MilpModel::new("knapsack");
/// let a = model.add_binary("a", -3.0);
/// let b = model.add_binary("b", -2.0);
/// model.add_constraint("weight", vec![(a, 2.0), (b, 2.0)], Comparison::LessEq, 3.0);
///
/// assert_eq!(model.num_variables(), 2);
/// assert_eq!(model.objective_value(&[1.0, 0.0]), -3.0);
/// assert!(model.is_feasible(&[1.0, 0.0], 1e-9));
/// assert!(!model.is_feasible(&[1.0, 1.0], 1e-9));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MilpModel {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    warm_start: Option<Vec<f64>>,
}

impl MilpModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            constraints: Vec::new(),
            warm_start: None,
        }
    }

    /// Adds a variable and returns its handle.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        lower: f64,
        upper: f64,
        cost: f64,
    ) -> VarId {
        let (lower, upper) = match kind {
            VarKind::Binary => (lower.max(0.0), upper.min(1.0)),
            _ => (lower, upper),
        };
        self.variables.push(Variable {
            name: name.into(),
            kind,
            lower,
            upper,
            cost,
        });
        VarId(self.variables.len() - 1)
    }

    /// Adds a {0, 1} variable.
    pub fn add_binary(&mut self, name: impl Into<String>, cost: f64) -> VarId {
        self.add_variable(name, VarKind::Binary, 0.0, 1.0, cost)
    }

    /// Adds a continuous variable within `[lower, upper]`.
    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64, cost: f64) -> VarId {
        self.add_variable(name, VarKind::Continuous, lower, upper, cost)
    }

    /// Adds a linear constraint. Zero coefficients are dropped.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        cmp: Comparison,
        rhs: f64,
    ) {
        let terms = terms.into_iter().filter(|&(_, c)| c != 0.0).collect();
        self.constraints.push(Constraint {
            name: name.into(),
            terms,
            cmp,
            rhs,
        });
    }

    /// Supplies a known feasible assignment, one value per variable.
    ///
    /// Backends may use it as their first incumbent; an infeasible or
    /// mis-sized hint is ignored.
    pub fn set_warm_start(&mut self, values: Vec<f64>) {
        self.warm_start = Some(values);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn warm_start(&self) -> Option<&[f64]> {
        self.warm_start.as_deref()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Objective of a full assignment.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.cost * x)
            .sum()
    }

    /// Checks bounds, integrality and every constraint within `tol`.
    pub fn is_feasible(&self, values: &[f64], tol: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let bounds_ok = self.variables.iter().zip(values).all(|(v, &x)| {
            x >= v.lower - tol
                && x <= v.upper + tol
                && (!v.kind.is_integral() || (x - x.round()).abs() <= tol)
        });
        bounds_ok
            && self.constraints.iter().all(|c| {
                let lhs: f64 = c.terms.iter().map(|&(id, a)| a * values[id.0]).sum();
                let slack = tol * c.rhs.abs().max(1.0);
                match c.cmp {
                    Comparison::LessEq => lhs <= c.rhs + slack,
                    Comparison::GreaterEq => lhs >= c.rhs - slack,
                    Comparison::Equal => (lhs - c.rhs).abs() <= slack,
                }
            })
    }
}
