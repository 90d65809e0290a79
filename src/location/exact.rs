//! Exact facility location over fixed candidate sites.
//!
//! # Formulation
//!
//! ```text
//! min  Σ_f m·F_f·open_f + Σ_c Σ_f k·d_c·dist(c,f)·assign_cf
//! s.t. Σ_f assign_cf = 1                     for every customer c
//!      assign_cf ≤ open_f                    for every pair (c, f)
//!      Σ_c d_c·assign_cf ≤ Q_f·open_f        for every site f
//!      open_f ∈ {0,1},  assign_cf ∈ {0,1} (or [0,1] with split deliveries)
//! ```
//!
//! `m` is the fixed-cost multiplier and `k` the cost per unit distance.
//! Under single sourcing, pairs whose demand exceeds the site capacity get
//! no variable at all.
//!
//! # Reference
//!
//! Sridharan, R. (1995). "The capacitated plant location problem",
//! *European Journal of Operational Research* 87(2), 203-213.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMatrix;
use crate::error::SolveError;
use crate::milp::{
    Comparison, MilpBackend, MilpModel, MilpStatus, SolveLimits, TerminationReason, VarId,
};
use crate::models::{CandidateFacility, Customer, LOAD_EPS};
use crate::quota::SolveContext;

use super::assign::demand_order;
use super::plan::{CustomerAssignment, FacilityPlan, Flow, SiteReport};

/// Shares below this are treated as zero when reading a solution.
const SHARE_EPS: f64 = 1e-6;

/// Configuration of the exact location engine.
///
/// # Examples
///
/// ```
/// use u_netdesign::location::MilpConfig;
///
/// let config = MilpConfig::default()
///     .with_fixed_cost_multiplier(2.0)
///     .with_single_sourcing(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilpConfig {
    /// Scales every fixed opening cost.
    pub fixed_cost_multiplier: f64,
    /// Transport cost per unit of demand and unit of distance.
    pub cost_per_unit_distance: f64,
    /// Each customer served by exactly one site; `false` allows split
    /// deliveries.
    pub single_sourcing: bool,
    /// Seed the backend with a greedy feasible plan.
    pub warm_start: bool,
    /// Branch-and-bound node limit; 0 means unlimited.
    pub max_nodes: u64,
    /// Relative optimality gap. Filled from the top-level solve options.
    #[serde(skip)]
    pub relative_gap: f64,
}

impl Default for MilpConfig {
    fn default() -> Self {
        Self {
            fixed_cost_multiplier: 1.0,
            cost_per_unit_distance: 1.0,
            single_sourcing: true,
            warm_start: true,
            max_nodes: 0,
            relative_gap: 0.01,
        }
    }
}

impl MilpConfig {
    pub fn with_fixed_cost_multiplier(mut self, m: f64) -> Self {
        self.fixed_cost_multiplier = m;
        self
    }

    pub fn with_cost_per_unit_distance(mut self, cost: f64) -> Self {
        self.cost_per_unit_distance = cost;
        self
    }

    pub fn with_single_sourcing(mut self, single: bool) -> Self {
        self.single_sourcing = single;
        self
    }

    pub fn with_warm_start(mut self, warm: bool) -> Self {
        self.warm_start = warm;
        self
    }

    pub fn with_max_nodes(mut self, n: u64) -> Self {
        self.max_nodes = n;
        self
    }

    pub fn with_relative_gap(mut self, gap: f64) -> Self {
        self.relative_gap = gap;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.fixed_cost_multiplier.is_finite() && self.fixed_cost_multiplier >= 0.0) {
            return Err(format!(
                "fixed_cost_multiplier must be non-negative, got {}",
                self.fixed_cost_multiplier
            ));
        }
        if !(self.cost_per_unit_distance.is_finite() && self.cost_per_unit_distance >= 0.0) {
            return Err(format!(
                "cost_per_unit_distance must be non-negative, got {}",
                self.cost_per_unit_distance
            ));
        }
        if !(self.relative_gap.is_finite() && (0.0..1.0).contains(&self.relative_gap)) {
            return Err(format!("optimality gap must be in [0, 1), got {}", self.relative_gap));
        }
        Ok(())
    }

    fn limits(&self) -> SolveLimits {
        SolveLimits {
            relative_gap: self.relative_gap,
            max_nodes: self.max_nodes,
        }
    }
}

/// Site-to-customer distances, `sites × customers`.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteDistances {
    customers: usize,
    data: Vec<f64>,
}

impl SiteDistances {
    /// Builds the table from a function of `(site, customer)`.
    pub fn from_fn(sites: usize, customers: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(sites * customers);
        for s in 0..sites {
            data.extend((0..customers).map(|c| f(s, c)));
        }
        Self { customers, data }
    }

    /// Reads the table from a matrix indexed sites first, then customers.
    pub fn from_matrix(matrix: &DistanceMatrix, sites: usize) -> Self {
        let customers = matrix.size().saturating_sub(sites);
        Self::from_fn(sites, customers, |s, c| matrix.get(s, sites + c))
    }

    pub fn get(&self, site: usize, customer: usize) -> f64 {
        self.data[site * self.customers + customer]
    }
}

/// Outcome of the exact location engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MilpLocationResult {
    /// `None` when the search stopped before any feasible plan.
    pub plan: Option<FacilityPlan>,
    pub status: MilpStatus,
    pub termination: TerminationReason,
    pub best_bound: Option<f64>,
    pub gap: Option<f64>,
    pub nodes: u64,
    /// Name of the backend that solved the model.
    pub backend: String,
}

/// Builds the location model and hands it to a [`MilpBackend`].
pub struct MilpLocationRunner;

impl MilpLocationRunner {
    /// Solves the capacitated location problem over `sites`.
    ///
    /// Returns [`SolveError::Infeasible`] when no plan can serve every
    /// customer. Hitting the deadline is not an error: the result carries the
    /// best plan found (if any) and [`TerminationReason::TimeLimit`].
    ///
    /// # Examples
    ///
    /// ```
    /// use u_netdesign::location::{MilpConfig, MilpLocationRunner, SiteDistances};
    /// use u_netdesign::milp::{BranchAndBound, MilpStatus};
    /// use u_netdesign::models::{CandidateFacility, Customer, Point};
    /// use u_netdesign::quota::SolveContext;
    ///
    /// let sites = vec![
    ///     CandidateFacility::new("F1", Point::new(0.0, 0.0), 10.0, 100.0),
    ///     CandidateFacility::new("F2", Point::new(9.0, 0.0), 10.0, 100.0),
    /// ];
    /// let customers = vec![Customer::new("C1", Point::new(1.0, 0.0), 5.0)];
    /// let dist = SiteDistances::from_fn(2, 1, |s, c| sites[s].location().euclidean(&customers[c].location()));
    ///
    /// let result = MilpLocationRunner::run(
    ///     &sites, &customers, &dist, &MilpConfig::default(),
    ///     &BranchAndBound::new(), &SolveContext::unbounded(),
    /// ).unwrap();
    /// assert_eq!(result.status, MilpStatus::Optimal);
    /// let plan = result.plan.unwrap();
    /// assert_eq!(plan.assignments[0].facility.as_deref(), Some("F1"));
    /// assert!((plan.total_cost - 15.0).abs() < 1e-6);
    /// ```
    pub fn run(
        sites: &[CandidateFacility],
        customers: &[Customer],
        distances: &SiteDistances,
        config: &MilpConfig,
        backend: &dyn MilpBackend,
        ctx: &SolveContext,
    ) -> Result<MilpLocationResult, SolveError> {
        config.validate().map_err(SolveError::InvalidInput)?;
        check_capacity(sites, customers, config.single_sourcing)?;

        if customers.is_empty() {
            let formulation = Formulation {
                open: Vec::new(),
                assign: Vec::new(),
            };
            let plan = formulation.extract(sites, customers, distances, config, &[]);
            return Ok(MilpLocationResult {
                plan: Some(plan),
                status: MilpStatus::Optimal,
                termination: TerminationReason::Completed,
                best_bound: Some(0.0),
                gap: Some(0.0),
                nodes: 0,
                backend: backend.name().to_string(),
            });
        }

        let (mut model, formulation) = build_model(sites, customers, distances, config);
        if config.warm_start {
            if let Some(ws) = formulation.greedy_start(&model, sites, customers, distances, config) {
                model.set_warm_start(ws);
            }
        }
        ctx.log(&format!(
            "facility milp: {} sites, {} customers, {} variables, {} constraints ({})",
            sites.len(),
            customers.len(),
            model.num_variables(),
            model.constraints().len(),
            backend.name()
        ));

        let outcome = backend.solve(&model, &config.limits(), ctx)?;
        ctx.log(&format!(
            "facility milp: {:?} after {} nodes ({})",
            outcome.status,
            outcome.nodes,
            outcome.termination.as_str()
        ));

        match outcome.status {
            MilpStatus::Infeasible => {
                return Err(SolveError::infeasible(
                    "no combination of open sites can serve every customer",
                ));
            }
            MilpStatus::Unbounded => {
                return Err(SolveError::failure("location model reported unbounded"));
            }
            _ => {}
        }

        let gap = outcome.gap();
        let plan = outcome
            .values
            .as_deref()
            .map(|v| formulation.extract(sites, customers, distances, config, v));
        Ok(MilpLocationResult {
            plan,
            status: outcome.status,
            termination: outcome.termination,
            best_bound: outcome.best_bound,
            gap,
            nodes: outcome.nodes,
            backend: backend.name().to_string(),
        })
    }
}

/// Rejects instances no plan can serve, before any model is built.
fn check_capacity(
    sites: &[CandidateFacility],
    customers: &[Customer],
    single_sourcing: bool,
) -> Result<(), SolveError> {
    if customers.is_empty() {
        return Ok(());
    }
    if sites.is_empty() {
        return Err(SolveError::infeasible("no candidate sites"));
    }
    let total_demand: f64 = customers.iter().map(|c| c.demand()).sum();
    let total_capacity: f64 = sites.iter().map(|s| s.capacity()).sum();
    if total_capacity + LOAD_EPS < total_demand {
        return Err(SolveError::infeasible(format!(
            "total capacity {total_capacity} is below total demand {total_demand}"
        )));
    }
    if single_sourcing {
        let largest = sites.iter().map(|s| s.capacity()).fold(0.0, f64::max);
        if let Some(c) = customers.iter().find(|c| c.demand() > largest + LOAD_EPS) {
            return Err(SolveError::infeasible(format!(
                "demand {} of '{}' exceeds every site capacity",
                c.demand(),
                c.id()
            )));
        }
    }
    Ok(())
}

fn transport_cost(customer: &Customer, distance: f64, config: &MilpConfig) -> f64 {
    customer.demand() * distance * config.cost_per_unit_distance
}

/// Variable handles of the location model.
struct Formulation {
    open: Vec<VarId>,
    /// `assign[c][f]`; `None` where the pair is excluded.
    assign: Vec<Vec<Option<VarId>>>,
}

fn build_model(
    sites: &[CandidateFacility],
    customers: &[Customer],
    distances: &SiteDistances,
    config: &MilpConfig,
) -> (MilpModel, Formulation) {
    let mut model = MilpModel::new("facility-location");

    let open: Vec<VarId> = sites
        .iter()
        .map(|s| model.add_binary(format!("open[{}]", s.id()), s.fixed_cost() * config.fixed_cost_multiplier))
        .collect();

    let assign: Vec<Vec<Option<VarId>>> = customers
        .iter()
        .enumerate()
        .map(|(c, customer)| {
            sites
                .iter()
                .enumerate()
                .map(|(f, site)| {
                    if config.single_sourcing && customer.demand() > site.capacity() + LOAD_EPS {
                        return None;
                    }
                    let name = format!("assign[{},{}]", customer.id(), site.id());
                    let cost = transport_cost(customer, distances.get(f, c), config);
                    Some(if config.single_sourcing {
                        model.add_binary(name, cost)
                    } else {
                        model.add_continuous(name, 0.0, 1.0, cost)
                    })
                })
                .collect()
        })
        .collect();

    for (c, customer) in customers.iter().enumerate() {
        let terms: Vec<(VarId, f64)> = assign[c].iter().flatten().map(|&x| (x, 1.0)).collect();
        model.add_constraint(format!("serve[{}]", customer.id()), terms, Comparison::Equal, 1.0);
    }

    for (c, customer) in customers.iter().enumerate() {
        for (f, site) in sites.iter().enumerate() {
            if let Some(x) = assign[c][f] {
                model.add_constraint(
                    format!("link[{},{}]", customer.id(), site.id()),
                    vec![(x, 1.0), (open[f], -1.0)],
                    Comparison::LessEq,
                    0.0,
                );
            }
        }
    }

    for (f, site) in sites.iter().enumerate() {
        let mut terms: Vec<(VarId, f64)> = customers
            .iter()
            .enumerate()
            .filter_map(|(c, customer)| assign[c][f].map(|x| (x, customer.demand())))
            .collect();
        terms.push((open[f], -site.capacity()));
        model.add_constraint(format!("capacity[{}]", site.id()), terms, Comparison::LessEq, 0.0);
    }

    (model, Formulation { open, assign })
}

impl Formulation {
    /// Largest demand first, each customer to the cheapest site with room;
    /// only used sites are opened. `None` if some customer does not fit.
    fn greedy_start(
        &self,
        model: &MilpModel,
        sites: &[CandidateFacility],
        customers: &[Customer],
        distances: &SiteDistances,
        config: &MilpConfig,
    ) -> Option<Vec<f64>> {
        let mut values = vec![0.0; model.num_variables()];
        let mut loads = vec![0.0; sites.len()];

        for c in demand_order(customers) {
            let demand = customers[c].demand();
            let (f, x) = self.assign[c]
                .iter()
                .enumerate()
                .filter_map(|(f, x)| x.map(|x| (f, x)))
                .filter(|&(f, _)| loads[f] + demand <= sites[f].capacity() + LOAD_EPS)
                .min_by(|a, b| {
                    let ca = transport_cost(&customers[c], distances.get(a.0, c), config);
                    let cb = transport_cost(&customers[c], distances.get(b.0, c), config);
                    ca.total_cmp(&cb).then(a.0.cmp(&b.0))
                })?;
            loads[f] += demand;
            values[x.index()] = 1.0;
            values[self.open[f].index()] = 1.0;
        }
        Some(values)
    }

    /// Turns backend values into a plan; costs are recomputed from the
    /// extracted flows.
    fn extract(
        &self,
        sites: &[CandidateFacility],
        customers: &[Customer],
        distances: &SiteDistances,
        config: &MilpConfig,
        values: &[f64],
    ) -> FacilityPlan {
        let mut is_open: Vec<bool> = self.open.iter().map(|x| values[x.index()] > 0.5).collect();
        is_open.resize(sites.len(), false);
        let mut loads = vec![0.0; sites.len()];
        let mut flows = Vec::new();
        let mut assignments = Vec::with_capacity(customers.len());
        let mut transport = 0.0;

        for (c, customer) in customers.iter().enumerate() {
            let mut best: Option<(usize, f64)> = None;
            for (f, x) in self.assign[c].iter().enumerate() {
                let Some(x) = x else { continue };
                let raw = values[x.index()].clamp(0.0, 1.0);
                let share = if config.single_sourcing { raw.round() } else { raw };
                if share < SHARE_EPS {
                    continue;
                }
                let amount = share * customer.demand();
                loads[f] += amount;
                transport += share * transport_cost(customer, distances.get(f, c), config);
                flows.push(Flow {
                    facility: sites[f].id().to_string(),
                    customer: customer.id().to_string(),
                    amount,
                });
                if best.is_none_or(|(_, s)| share > s + SHARE_EPS) {
                    best = Some((f, share));
                }
            }
            assignments.push(CustomerAssignment {
                customer: customer.id().to_string(),
                facility: best.map(|(f, _)| sites[f].id().to_string()),
                demand: customer.demand(),
            });
        }

        let reports: Vec<SiteReport> = sites
            .iter()
            .enumerate()
            .map(|(f, s)| SiteReport {
                id: s.id().to_string(),
                location: s.location(),
                open: is_open[f],
                load: loads[f],
                capacity: Some(s.capacity()),
                fixed_cost: s.fixed_cost() * config.fixed_cost_multiplier,
            })
            .collect();
        let fixed: f64 = reports.iter().filter(|s| s.open).map(|s| s.fixed_cost).sum();

        FacilityPlan {
            sites: reports,
            assignments,
            flows,
            fixed_cost: fixed,
            transport_cost: transport,
            penalty: 0.0,
            total_cost: fixed + transport,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::milp::BranchAndBound;
    use crate::models::Point;
    use proptest::prelude::*;

    /// Enumerates every single-source assignment.
    fn brute_force(
        sites: &[CandidateFacility],
        customers: &[Customer],
        dist: &SiteDistances,
    ) -> Option<f64> {
        let n = customers.len();
        let m = sites.len();
        let mut best: Option<f64> = None;
        let mut choice = vec![0usize; n];
        loop {
            let mut loads = vec![0.0; m];
            let mut transport = 0.0;
            for (c, &f) in choice.iter().enumerate() {
                loads[f] += customers[c].demand();
                transport += customers[c].demand() * dist.get(f, c);
            }
            if loads.iter().zip(sites).all(|(l, s)| *l <= s.capacity() + 1e-9) {
                let fixed: f64 = (0..m)
                    .filter(|&f| choice.contains(&f))
                    .map(|f| sites[f].fixed_cost())
                    .sum();
                let total = fixed + transport;
                best = Some(best.map_or(total, |b: f64| b.min(total)));
            }
            let mut i = 0;
            loop {
                if i == n {
                    return best;
                }
                choice[i] += 1;
                if choice[i] < m {
                    break;
                }
                choice[i] = 0;
                i += 1;
            }
        }
    }

    fn instance() -> impl Strategy<Value = (Vec<CandidateFacility>, Vec<Customer>)> {
        let sites = prop::collection::vec((0.0..20.0f64, 0.0..20.0f64, 0.0..30.0f64, 5.0..25.0f64), 1..4);
        let customers = prop::collection::vec((0.0..20.0f64, 0.0..20.0f64, 0.0..10.0f64), 1..5);
        (sites, customers).prop_map(|(s, c)| {
            let sites = s
                .into_iter()
                .enumerate()
                .map(|(i, (x, y, fc, cap))| {
                    CandidateFacility::new(format!("F{i}"), Point::new(x, y), fc.round(), cap.round())
                })
                .collect();
            let customers = c
                .into_iter()
                .enumerate()
                .map(|(i, (x, y, d))| Customer::new(format!("C{i}"), Point::new(x, y), d.round()))
                .collect();
            (sites, customers)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Plans serve each customer once within capacity, at the cost
        /// enumeration finds.
        #[test]
        fn prop_plan_matches_enumeration((sites, customers) in instance()) {
            let dist = SiteDistances::from_fn(sites.len(), customers.len(), |s, c| {
                sites[s].location().euclidean(&customers[c].location())
            });
            let config = MilpConfig::default().with_relative_gap(0.0);
            let result = MilpLocationRunner::run(
                &sites, &customers, &dist, &config,
                &BranchAndBound::new(), &SolveContext::unbounded(),
            );
            let expected = brute_force(&sites, &customers, &dist);
            match (result, expected) {
                (Err(SolveError::Infeasible(_)), None) => {}
                (Ok(result), Some(best)) => {
                    prop_assert_eq!(result.status, MilpStatus::Optimal);
                    let plan = result.plan.expect("plan");
                    prop_assert!(plan.is_complete());
                    prop_assert_eq!(plan.flows.len(), customers.len());
                    for s in &plan.sites {
                        prop_assert!(s.load <= s.capacity.unwrap_or(f64::INFINITY) + 1e-6);
                        if s.load > 0.0 {
                            prop_assert!(s.open);
                        }
                    }
                    let recomputed: f64 = plan
                        .flows
                        .iter()
                        .map(|fl| {
                            let f = sites.iter().position(|s| s.id() == fl.facility).expect("site");
                            let c = customers.iter().position(|c| c.id() == fl.customer).expect("customer");
                            fl.amount * dist.get(f, c)
                        })
                        .sum::<f64>()
                        + plan.fixed_cost;
                    prop_assert!((recomputed - plan.total_cost).abs() < 1e-6);
                    prop_assert!((plan.total_cost - best).abs() < 1e-5 * best.abs().max(1.0));
                }
                (other, expected) => {
                    prop_assert!(false, "got {:?}, enumeration found {:?}", other, expected);
                }
            }
        }

        /// Total capacity below total demand is always infeasible.
        #[test]
        fn prop_capacity_shortfall_infeasible(
            caps in prop::collection::vec(1.0..10.0f64, 1..4),
            extra in 0.5..10.0f64,
        ) {
            let sites: Vec<CandidateFacility> = caps
                .iter()
                .enumerate()
                .map(|(i, &cap)| CandidateFacility::new(format!("F{i}"), Point::new(0.0, 0.0), 1.0, cap))
                .collect();
            let total: f64 = caps.iter().sum();
            let customers = vec![
                Customer::new("A", Point::new(0.0, 0.0), total / 2.0),
                Customer::new("B", Point::new(1.0, 0.0), total / 2.0 + extra),
            ];
            let dist = SiteDistances::from_fn(sites.len(), 2, |_, _| 1.0);
            let config = MilpConfig::default().with_single_sourcing(false);
            let result = MilpLocationRunner::run(
                &sites, &customers, &dist, &config,
                &BranchAndBound::new(), &SolveContext::unbounded(),
            );
            prop_assert!(matches!(result, Err(SolveError::Infeasible(_))));
        }
    }
}
