//! Solve orchestrator: validation, dispatch and result normalization.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::SolveConfig;
use crate::distance::{build_matrix, check_points, DistanceEntry};
use crate::envelope::{EngineKind, Payload, RoutePlan, SolutionEnvelope, SolveStats, SolveStatus};
use crate::error::SolveError;
use crate::location::{
    MilpLocationRunner, NewSites, PsoResult, PsoRunner, PsoTermination, SiteDistances,
};
use crate::milp::{BranchAndBound, MilpBackend, MilpStatus, TerminationReason};
use crate::models::{CandidateFacility, Customer, Depot, Point, RoutingNetwork, Vehicle};
use crate::quota::{SolveContext, TimeQuota};
use crate::routing::VrpRunner;
use crate::telemetry::{silent_logger, InfoLogger};

/// The tables of one problem, tagged by the engine that solves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "kebab-case")]
pub enum Problem {
    /// Choose among candidate sites exactly.
    FacilityMilp {
        facilities: Vec<CandidateFacility>,
        customers: Vec<Customer>,
    },
    /// Place new sites anywhere in the plane.
    FacilityPso {
        customers: Vec<Customer>,
        #[serde(default)]
        sites: NewSites,
    },
    /// Route a fleet out of one depot.
    Vrp {
        depot: Depot,
        customers: Vec<Customer>,
        vehicles: Vec<Vehicle>,
    },
}

impl Problem {
    pub fn kind(&self) -> EngineKind {
        match self {
            Problem::FacilityMilp { .. } => EngineKind::FacilityMilp,
            Problem::FacilityPso { .. } => EngineKind::FacilityPso,
            Problem::Vrp { .. } => EngineKind::Vrp,
        }
    }
}

/// A complete problem instance as handed over by the presentation layer.
///
/// # Examples
///
/// ```
/// use u_netdesign::solver::{ProblemInstance, Solver};
/// use u_netdesign::envelope::SolveStatus;
///
/// let instance: ProblemInstance = serde_json::from_str(r#"{
///     "engine": "vrp",
///     "depot": {"id": "D", "location": {"x": 0.0, "y": 0.0}},
///     "customers": [{"id": "C1", "location": {"x": 3.0, "y": 4.0}, "demand": 2.0}],
///     "vehicles": [{"id": "V1", "capacity": 10.0}],
///     "config": {"time_limit_seconds": 5}
/// }"#).unwrap();
///
/// let envelope = Solver::new().solve(&instance);
/// assert_eq!(envelope.status, SolveStatus::FeasibleNonOptimal);
/// assert_eq!(envelope.objective, Some(10.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInstance {
    #[serde(flatten)]
    pub problem: Problem,
    /// Distance rows for the precomputed distance mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distances: Option<Vec<DistanceEntry>>,
    #[serde(default)]
    pub config: SolveConfig,
}

impl ProblemInstance {
    pub fn new(problem: Problem) -> Self {
        Self {
            problem,
            distances: None,
            config: SolveConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SolveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_distances(mut self, entries: Vec<DistanceEntry>) -> Self {
        self.distances = Some(entries);
        self
    }
}

/// Runs one problem instance to a [`SolutionEnvelope`].
///
/// A solver holds no state between calls; one value can serve concurrent
/// solves from several threads.
pub struct Solver {
    backend: Box<dyn MilpBackend>,
    logger: InfoLogger,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// A solver using the built-in branch-and-bound and a silent logger.
    pub fn new() -> Self {
        Self {
            backend: Box::new(BranchAndBound::new()),
            logger: silent_logger(),
            cancel: None,
        }
    }

    /// Replaces the MILP backend.
    pub fn with_backend(mut self, backend: Box<dyn MilpBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_logger(mut self, logger: InfoLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Stops every solve of this solver once `flag` is raised.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Solves `instance`. Never panics and never fails: every outcome,
    /// including invalid input and engine faults, is a status in the
    /// returned envelope.
    pub fn solve(&self, instance: &ProblemInstance) -> SolutionEnvelope {
        let started = Instant::now();
        let kind = instance.problem.kind();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(instance)));
        let mut envelope = match outcome {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(err)) => SolutionEnvelope::from_error(kind, &err),
            Err(payload) => SolutionEnvelope::from_error(
                kind,
                &SolveError::failure(format!("engine panicked: {}", panic_text(payload.as_ref()))),
            ),
        };
        envelope.stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        (self.logger)(&format!(
            "{}: {} after {} ms",
            kind.as_str(),
            envelope.status.as_str(),
            envelope.stats.elapsed_ms
        ));
        envelope
    }

    fn run(&self, instance: &ProblemInstance) -> Result<SolutionEnvelope, SolveError> {
        let config = &instance.config;
        config.validate().map_err(SolveError::InvalidInput)?;
        validate(&instance.problem)?;

        let mut quota = TimeQuota::new(config.time_limit_seconds);
        if let Some(flag) = &self.cancel {
            quota = quota.with_cancel(flag.clone());
        }
        let ctx = SolveContext::new(Arc::new(quota), self.logger.clone());
        let entries = instance.distances.as_deref();

        match &instance.problem {
            Problem::FacilityMilp {
                facilities,
                customers,
            } => self.solve_milp(facilities, customers, entries, config, &ctx),
            Problem::FacilityPso { customers, sites } => solve_pso(customers, sites, config, &ctx),
            Problem::Vrp {
                depot,
                customers,
                vehicles,
            } => solve_vrp(depot, customers, vehicles, entries, config, &ctx),
        }
    }

    fn solve_milp(
        &self,
        facilities: &[CandidateFacility],
        customers: &[Customer],
        entries: Option<&[DistanceEntry]>,
        config: &SolveConfig,
        ctx: &SolveContext,
    ) -> Result<SolutionEnvelope, SolveError> {
        let ids: Vec<&str> = facilities
            .iter()
            .map(|f| f.id())
            .chain(customers.iter().map(|c| c.id()))
            .collect();
        let points: Vec<Point> = facilities
            .iter()
            .map(|f| f.location())
            .chain(customers.iter().map(|c| c.location()))
            .collect();
        let matrix = build_matrix(&ids, &points, config.distance_mode, entries)?;
        let distances = SiteDistances::from_matrix(&matrix, facilities.len());

        let result = MilpLocationRunner::run(
            facilities,
            customers,
            &distances,
            &config.milp_config(),
            self.backend.as_ref(),
            ctx,
        )?;

        let stats = SolveStats {
            nodes: result.nodes,
            termination: Some(result.termination.as_str().to_string()),
            attempts: 1,
            best_bound: result.best_bound,
            gap: result.gap,
            backend: Some(result.backend.clone()),
            ..SolveStats::default()
        };
        let hit_deadline = result.termination == TerminationReason::TimeLimit;

        let Some(plan) = result.plan else {
            let reason = match result.termination {
                TerminationReason::NodeLimit => "node limit",
                _ => "deadline",
            };
            return Ok(SolutionEnvelope::new(EngineKind::FacilityMilp, SolveStatus::TimeLimitReached)
                .with_stats(stats)
                .with_diagnostic(format!("no feasible plan found before the {reason}")));
        };

        let status = if hit_deadline {
            SolveStatus::TimeLimitReached
        } else if result.status == MilpStatus::Optimal {
            SolveStatus::Optimal
        } else {
            SolveStatus::FeasibleNonOptimal
        };
        let mut envelope = SolutionEnvelope::new(EngineKind::FacilityMilp, status)
            .with_payload(Payload::Facility(plan), true)
            .with_stats(stats);
        if let Some(gap) = result.gap.filter(|_| status != SolveStatus::Optimal) {
            envelope = envelope.with_diagnostic(format!("stopped at relative gap {gap:.6}"));
        }
        Ok(envelope)
    }
}

fn solve_pso(
    customers: &[Customer],
    sites: &NewSites,
    config: &SolveConfig,
    ctx: &SolveContext,
) -> Result<SolutionEnvelope, SolveError> {
    let metric = config.distance_mode.metric().ok_or_else(|| {
        SolveError::invalid("the swarm engine places new sites and needs a geometric distance mode")
    })?;
    let ids: Vec<&str> = customers.iter().map(|c| c.id()).collect();
    let points: Vec<Point> = customers.iter().map(|c| c.location()).collect();
    check_points(&ids, &points, config.distance_mode)?;

    let mut pso = config.pso_config();
    let base_seed = pso.seed.unwrap_or_else(rand::random);
    let (best, attempts) = cheapest_attempt(base_seed, config.heuristic_retries, ctx, |seed| {
        pso.seed = Some(seed);
        PsoRunner::run(customers, sites, metric, &pso, ctx)
    })?;
    let packed = !best.plan.is_complete() && best.termination != PsoTermination::TimeLimit;
    let best = if packed {
        PsoRunner::complete_by_packing(best, customers, sites, metric, ctx)?
    } else {
        best
    };

    let complete = best.plan.is_complete();
    let status = if best.termination == PsoTermination::TimeLimit {
        SolveStatus::TimeLimitReached
    } else if complete {
        SolveStatus::FeasibleNonOptimal
    } else {
        SolveStatus::Infeasible
    };
    let mut diagnostics = vec![format!("seed {}", best.seed)];
    diagnostics.extend(
        best.plan
            .unplaced()
            .map(|a| format!("customer '{}' could not be placed", a.customer)),
    );
    if packed && complete {
        diagnostics.push(format!(
            "nearest-site placement left customers over in {attempts} attempt(s); sites moved onto an exact demand split"
        ));
    } else if !complete {
        diagnostics.push(format!("no complete placement found in {attempts} attempt(s)"));
    }

    let stats = SolveStats {
        iterations: best.generations as u64,
        termination: Some(best.termination.as_str().to_string()),
        seed: Some(best.seed),
        attempts,
        history: best.history,
        ..SolveStats::default()
    };
    let mut envelope = SolutionEnvelope::new(EngineKind::FacilityPso, status)
        .with_payload(Payload::Facility(best.plan), complete)
        .with_stats(stats);
    envelope.diagnostics = diagnostics;
    Ok(envelope)
}

/// Runs the swarm with seeds `base_seed`, `base_seed + 1`, ... until a run
/// places every customer, the deadline passes or `retries` extra runs are
/// spent. Returns the cheapest run and the number of runs made.
fn cheapest_attempt<F>(
    base_seed: u64,
    retries: u32,
    ctx: &SolveContext,
    mut attempt: F,
) -> Result<(PsoResult, u32), SolveError>
where
    F: FnMut(u64) -> Result<PsoResult, SolveError>,
{
    let mut best: Option<PsoResult> = None;
    let mut attempts = 0;
    for k in 0..=retries {
        let result = attempt(base_seed.wrapping_add(u64::from(k)))?;
        attempts += 1;
        let finished = result.plan.is_complete() || result.termination == PsoTermination::TimeLimit;
        if best.as_ref().is_none_or(|b| result.best_cost < b.best_cost) {
            best = Some(result);
        }
        if finished || ctx.is_stopped() {
            break;
        }
        ctx.log(&format!("facility pso: attempt {attempts} left customers unplaced, retrying"));
    }
    best.map(|b| (b, attempts))
        .ok_or_else(|| SolveError::failure("swarm search produced no result"))
}

fn solve_vrp(
    depot: &Depot,
    customers: &[Customer],
    vehicles: &[Vehicle],
    entries: Option<&[DistanceEntry]>,
    config: &SolveConfig,
    ctx: &SolveContext,
) -> Result<SolutionEnvelope, SolveError> {
    let ids: Vec<&str> = std::iter::once(depot.id())
        .chain(customers.iter().map(|c| c.id()))
        .collect();
    let points: Vec<Point> = std::iter::once(depot.location())
        .chain(customers.iter().map(|c| c.location()))
        .collect();
    let matrix = build_matrix(&ids, &points, config.distance_mode, entries)?;
    let vrp = config.vrp_config();
    let network = RoutingNetwork::new(depot.clone(), customers.to_vec(), matrix, vrp.speed);

    let result = VrpRunner::run(&network, vehicles, &vrp, ctx)?;
    let plan = RoutePlan::from_solution(&network, vehicles, &result.solution);
    let complete = result.solution.is_complete();
    let status = if result.hit_time_limit() {
        SolveStatus::TimeLimitReached
    } else if complete {
        SolveStatus::FeasibleNonOptimal
    } else {
        SolveStatus::Infeasible
    };
    let diagnostics: Vec<String> = plan
        .unassigned
        .iter()
        .map(|u| format!("customer '{}' unassigned: {}", u.customer, u.reason.as_str()))
        .collect();

    let stats = SolveStats {
        iterations: result.iterations as u64,
        termination: Some(result.termination.as_str().to_string()),
        attempts: 1,
        initial_cost: Some(result.initial_cost),
        moves: result.moves,
        ..SolveStats::default()
    };
    let mut envelope = SolutionEnvelope::new(EngineKind::Vrp, status)
        .with_payload(Payload::Routes(plan), complete)
        .with_stats(stats);
    envelope.diagnostics = diagnostics;
    Ok(envelope)
}

/// Shape checks run before any engine.
fn validate(problem: &Problem) -> Result<(), SolveError> {
    match problem {
        Problem::FacilityMilp {
            facilities,
            customers,
        } => {
            unique_ids(
                "point",
                facilities
                    .iter()
                    .map(|f| f.id())
                    .chain(customers.iter().map(|c| c.id())),
            )?;
            for f in facilities {
                if !(f.capacity().is_finite() && f.capacity() > 0.0) {
                    return Err(SolveError::invalid(format!(
                        "facility '{}' capacity must be positive, got {}",
                        f.id(),
                        f.capacity()
                    )));
                }
                if !(f.fixed_cost().is_finite() && f.fixed_cost() >= 0.0) {
                    return Err(SolveError::invalid(format!(
                        "facility '{}' fixed cost must be non-negative, got {}",
                        f.id(),
                        f.fixed_cost()
                    )));
                }
            }
            check_customers(customers)
        }
        Problem::FacilityPso { customers, sites } => {
            unique_ids("customer", customers.iter().map(|c| c.id()))?;
            sites.validate().map_err(SolveError::InvalidInput)?;
            check_customers(customers)
        }
        Problem::Vrp {
            depot,
            customers,
            vehicles,
        } => {
            unique_ids(
                "point",
                std::iter::once(depot.id()).chain(customers.iter().map(|c| c.id())),
            )?;
            unique_ids("vehicle", vehicles.iter().map(|v| v.id()))?;
            if vehicles.is_empty() {
                return Err(SolveError::invalid("the fleet has no vehicles"));
            }
            if depot.time_window().is_some_and(|tw| !tw.is_well_formed()) {
                return Err(SolveError::invalid(format!(
                    "depot '{}' time window is not well formed",
                    depot.id()
                )));
            }
            for v in vehicles {
                if !(v.capacity().is_finite() && v.capacity() > 0.0) {
                    return Err(SolveError::invalid(format!(
                        "vehicle '{}' capacity must be positive, got {}",
                        v.id(),
                        v.capacity()
                    )));
                }
                if !(v.cost_per_distance().is_finite() && v.cost_per_distance() >= 0.0) {
                    return Err(SolveError::invalid(format!(
                        "vehicle '{}' cost per distance must be non-negative",
                        v.id()
                    )));
                }
                for (name, limit) in [
                    ("max duration", v.max_duration()),
                    ("max drive time", v.max_drive_time()),
                ] {
                    if limit.is_some_and(|l| l.is_nan() || l < 0.0) {
                        return Err(SolveError::invalid(format!(
                            "vehicle '{}' {name} must be non-negative",
                            v.id()
                        )));
                    }
                }
            }
            check_customers(customers)
        }
    }
}

fn unique_ids<'a>(what: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), SolveError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(SolveError::invalid(format!("empty {what} id")));
        }
        if !seen.insert(id) {
            return Err(SolveError::invalid(format!("duplicate {what} id '{id}'")));
        }
    }
    Ok(())
}

fn check_customers(customers: &[Customer]) -> Result<(), SolveError> {
    for c in customers {
        if !(c.demand().is_finite() && c.demand() >= 0.0) {
            return Err(SolveError::invalid(format!(
                "customer '{}' demand must be non-negative, got {}",
                c.id(),
                c.demand()
            )));
        }
        if !(c.service_duration().is_finite() && c.service_duration() >= 0.0) {
            return Err(SolveError::invalid(format!(
                "customer '{}' service duration must be non-negative",
                c.id()
            )));
        }
        if let Some(tw) = c.time_window() {
            if !tw.is_well_formed() {
                return Err(SolveError::invalid(format!(
                    "customer '{}' time window [{}, {}] is not well formed",
                    c.id(),
                    tw.earliest(),
                    tw.latest()
                )));
            }
        }
    }
    Ok(())
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMode;
    use crate::milp::{MilpModel, MilpOutcome, SolveLimits};
    use crate::models::{TimeWindow, UnassignedReason};
    use std::sync::atomic::Ordering;

    fn scenario_a() -> ProblemInstance {
        // unit transport cost for every pair
        let facilities = vec![
            CandidateFacility::new("F1", Point::new(0.0, 0.0), 10.0, 100.0),
            CandidateFacility::new("F2", Point::new(1.0, 0.0), 10.0, 100.0),
        ];
        let customers: Vec<Customer> = (1..=3)
            .map(|i| Customer::new(format!("C{i}"), Point::new(0.5, i as f64), 50.0))
            .collect();
        let mut entries = Vec::new();
        for f in &facilities {
            for c in &customers {
                entries.push(DistanceEntry::new(f.id(), c.id(), 1.0));
            }
        }
        entries.push(DistanceEntry::new("F1", "F2", 1.0));
        for a in &customers {
            for b in &customers {
                if a.id() < b.id() {
                    entries.push(DistanceEntry::new(a.id(), b.id(), 1.0));
                }
            }
        }
        ProblemInstance::new(Problem::FacilityMilp {
            facilities,
            customers,
        })
        .with_distances(entries)
        .with_config(SolveConfig::default().with_distance_mode(DistanceMode::Precomputed))
    }

    fn vrp(customers: Vec<Customer>, fleet: usize) -> ProblemInstance {
        ProblemInstance::new(Problem::Vrp {
            depot: Depot::new("DEPOT", Point::new(0.0, 0.0)),
            customers,
            vehicles: (1..=fleet).map(|i| Vehicle::new(format!("V{i}"), 10.0)).collect(),
        })
    }

    fn clusters() -> Vec<Customer> {
        let mut customers = Vec::new();
        for (i, (x, y)) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].iter().enumerate() {
            customers.push(Customer::new(format!("L{i}"), Point::new(*x, *y), 10.0));
            customers.push(Customer::new(format!("H{i}"), Point::new(100.0 + x, 100.0 + y), 10.0));
        }
        customers
    }

    struct PanickingBackend;

    impl MilpBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        fn solve(&self, _: &MilpModel, _: &SolveLimits, _: &SolveContext) -> Result<MilpOutcome, SolveError> {
            panic!("pivot table corrupted")
        }
    }

    struct FailingBackend;

    impl MilpBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn solve(&self, _: &MilpModel, _: &SolveLimits, _: &SolveContext) -> Result<MilpOutcome, SolveError> {
            Err(SolveError::failure("license expired"))
        }
    }

    #[test]
    fn test_scenario_a_opens_both_sites() {
        let env = Solver::new().solve(&scenario_a());
        assert_eq!(env.status, SolveStatus::Optimal);
        assert!(env.feasible);
        let plan = env.payload.as_ref().and_then(Payload::as_facility).expect("plan");
        assert_eq!(plan.num_open(), 2);
        // 2 × 10 fixed + 150 demand × unit distance
        assert!((env.objective.expect("objective") - 170.0).abs() < 1e-6);
        assert_eq!(env.stats.termination.as_deref(), Some("completed"));
        assert_eq!(env.stats.backend.as_deref(), Some("branch-and-bound"));
    }

    #[test]
    fn test_milp_capacity_shortfall_is_infeasible() {
        let instance = ProblemInstance::new(Problem::FacilityMilp {
            facilities: vec![CandidateFacility::new("F1", Point::new(0.0, 0.0), 1.0, 40.0)],
            customers: vec![Customer::new("C1", Point::new(1.0, 0.0), 50.0)],
        });
        let env = Solver::new().solve(&instance);
        assert_eq!(env.status, SolveStatus::Infeasible);
        assert!(!env.feasible);
        assert!(env.payload.is_none());
        assert!(env.diagnostics[0].contains("infeasible"));
    }

    #[test]
    fn test_missing_matrix_pair_is_malformed() {
        let mut instance = scenario_a();
        if let Some(entries) = instance.distances.as_mut() {
            entries.retain(|e| !(e.from == "F2" && e.to == "C3"));
        }
        let env = Solver::new().solve(&instance);
        assert_eq!(env.status, SolveStatus::MalformedMatrix);
    }

    #[test]
    fn test_backend_panic_becomes_solver_failure() {
        let env = Solver::new().with_backend(Box::new(PanickingBackend)).solve(&scenario_a());
        assert_eq!(env.status, SolveStatus::SolverFailure);
        assert!(env.diagnostics[0].contains("pivot table corrupted"));
    }

    #[test]
    fn test_backend_error_is_surfaced() {
        let instance = scenario_a().with_config(
            SolveConfig::default()
                .with_distance_mode(DistanceMode::Precomputed)
                .with_milp(crate::location::MilpConfig::default().with_warm_start(false)),
        );
        let env = Solver::new().with_backend(Box::new(FailingBackend)).solve(&instance);
        assert_eq!(env.status, SolveStatus::SolverFailure);
        assert!(env.diagnostics[0].contains("license expired"));
    }

    #[test]
    fn test_duplicate_ids_are_invalid() {
        let instance = vrp(
            vec![
                Customer::new("C1", Point::new(1.0, 0.0), 1.0),
                Customer::new("C1", Point::new(2.0, 0.0), 1.0),
            ],
            1,
        );
        let env = Solver::new().solve(&instance);
        assert_eq!(env.status, SolveStatus::InvalidInput);
        assert!(env.diagnostics[0].contains("duplicate"));

        let clash = vrp(vec![Customer::new("DEPOT", Point::new(1.0, 0.0), 1.0)], 1);
        assert_eq!(Solver::new().solve(&clash).status, SolveStatus::InvalidInput);
    }

    #[test]
    fn test_negative_demand_and_bad_window_are_invalid() {
        let negative = vrp(vec![Customer::new("C1", Point::new(1.0, 0.0), -1.0)], 1);
        assert_eq!(Solver::new().solve(&negative).status, SolveStatus::InvalidInput);

        let json = r#"{
            "engine": "vrp",
            "depot": {"id": "D", "location": {"x": 0, "y": 0}},
            "customers": [{"id": "C1", "location": {"x": 1, "y": 0}, "demand": 1,
                           "time_window": {"earliest": 9, "latest": 3}}],
            "vehicles": [{"id": "V1", "capacity": 5}]
        }"#;
        let instance: ProblemInstance = serde_json::from_str(json).expect("parse");
        let env = Solver::new().solve(&instance);
        assert_eq!(env.status, SolveStatus::InvalidInput);
        assert!(env.diagnostics[0].contains("time window"));
    }

    #[test]
    fn test_zero_capacity_and_bad_config_are_invalid() {
        let instance = ProblemInstance::new(Problem::Vrp {
            depot: Depot::new("D", Point::new(0.0, 0.0)),
            customers: vec![],
            vehicles: vec![Vehicle::new("V1", 0.0)],
        });
        assert_eq!(Solver::new().solve(&instance).status, SolveStatus::InvalidInput);

        let instance = vrp(vec![], 1).with_config(SolveConfig::default().with_time_limit(-5.0));
        assert_eq!(Solver::new().solve(&instance).status, SolveStatus::InvalidInput);
    }

    #[test]
    fn test_non_finite_point_is_invalid() {
        let instance = vrp(vec![Customer::new("C1", Point::new(f64::NAN, 0.0), 1.0)], 1);
        assert_eq!(Solver::new().solve(&instance).status, SolveStatus::InvalidInput);
    }

    #[test]
    fn test_scenario_c_needs_two_routes() {
        let customers = vec![
            Customer::new("C1", Point::new(3.0, 0.0), 8.0),
            Customer::new("C2", Point::new(0.0, 4.0), 8.0),
        ];
        let env = Solver::new().solve(&vrp(customers.clone(), 2));
        assert_eq!(env.status, SolveStatus::FeasibleNonOptimal);
        assert!(env.feasible);
        let plan = env.payload.as_ref().and_then(Payload::as_routes).expect("routes");
        assert_eq!(plan.num_used(), 2);

        let env = Solver::new().solve(&vrp(customers, 1));
        assert_eq!(env.status, SolveStatus::Infeasible);
        assert!(!env.feasible);
        let plan = env.payload.as_ref().and_then(Payload::as_routes).expect("routes");
        assert_eq!(plan.routes.len(), 1);
        assert_eq!(plan.unassigned.len(), 1);
        assert_eq!(plan.unassigned[0].reason, UnassignedReason::FleetExhausted);
        assert!(env.diagnostics[0].contains("fleet-exhausted"));
    }

    #[test]
    fn test_scenario_d_reports_unservable_customer() {
        let tw = TimeWindow::new(10.0, 11.0).expect("window");
        let customers = vec![
            Customer::new("A", Point::new(10.0, 0.0), 1.0).with_time_window(tw),
            Customer::new("B", Point::new(-10.0, 0.0), 1.0).with_time_window(tw),
        ];
        let env = Solver::new().solve(&vrp(customers, 1));
        assert_eq!(env.status, SolveStatus::Infeasible);
        let plan = env.payload.as_ref().and_then(Payload::as_routes).expect("routes");
        assert_eq!(plan.unassigned.len(), 1);
        for stop in &plan.routes[0].stops {
            assert!(stop.service_start <= 11.0 + 1e-9);
        }
    }

    #[test]
    fn test_scenario_b_swarm() {
        let short = ProblemInstance::new(Problem::FacilityPso {
            customers: clusters(),
            sites: NewSites::new(1).with_capacity(79.0),
        })
        .with_config(SolveConfig::default().with_seed(3));
        let env = Solver::new().solve(&short);
        assert_eq!(env.status, SolveStatus::Infeasible);
        assert!(env.payload.is_none());

        let enough = ProblemInstance::new(Problem::FacilityPso {
            customers: clusters(),
            sites: NewSites::new(1).with_capacity(80.0),
        })
        .with_config(SolveConfig::default().with_seed(3));
        let env = Solver::new().solve(&enough);
        assert_eq!(env.status, SolveStatus::FeasibleNonOptimal);
        assert!(env.feasible);
        assert_eq!(env.stats.seed, Some(3));
        assert_eq!(env.diagnostics[0], "seed 3");
        assert_eq!(env.stats.history.len() as u64, env.stats.iterations);
    }

    #[test]
    fn test_swarm_is_reproducible_through_solver() {
        let instance = ProblemInstance::new(Problem::FacilityPso {
            customers: clusters(),
            sites: NewSites::new(2).with_capacity(50.0),
        })
        .with_config(SolveConfig::default().with_seed(11).with_pso_iterations(40));
        let a = Solver::new().solve(&instance);
        let b = Solver::new().solve(&instance);
        assert_eq!(a.objective, b.objective);
        assert_eq!(a.payload, b.payload);
    }

    #[test]
    fn test_swarm_without_seed_reports_one() {
        let instance = ProblemInstance::new(Problem::FacilityPso {
            customers: clusters(),
            sites: NewSites::new(2),
        })
        .with_config(SolveConfig::default().with_pso_iterations(5));
        let env = Solver::new().solve(&instance);
        let seed = env.stats.seed.expect("seed drawn");
        assert_eq!(env.diagnostics[0], format!("seed {seed}"));
        assert_eq!(env.stats.attempts, 1);

        // replaying the drawn seed reproduces the run
        let replay = Solver::new().solve(&ProblemInstance {
            config: instance.config.clone().with_seed(seed),
            ..instance.clone()
        });
        assert_eq!(replay.payload, env.payload);
    }

    #[test]
    fn test_swarm_rejects_precomputed_mode() {
        let instance = ProblemInstance::new(Problem::FacilityPso {
            customers: clusters(),
            sites: NewSites::new(1),
        })
        .with_config(SolveConfig::default().with_distance_mode(DistanceMode::Precomputed));
        assert_eq!(Solver::new().solve(&instance).status, SolveStatus::InvalidInput);
    }

    fn same_spot(demands: &[f64]) -> Vec<Customer> {
        demands
            .iter()
            .enumerate()
            .map(|(i, &d)| Customer::new(format!("C{i}"), Point::new(0.0, 0.0), d))
            .collect()
    }

    #[test]
    fn test_swarm_places_demand_first_fit_cannot() {
        // 5+3+2 and 4+3+3 fill both sites exactly
        let instance = ProblemInstance::new(Problem::FacilityPso {
            customers: same_spot(&[5.0, 4.0, 3.0, 3.0, 3.0, 2.0]),
            sites: NewSites::new(2).with_capacity(10.0),
        })
        .with_config(SolveConfig::default().with_seed(1).with_heuristic_retries(3));
        let env = Solver::new().solve(&instance);
        assert_eq!(env.status, SolveStatus::FeasibleNonOptimal, "{:?}", env.diagnostics);
        assert!(env.feasible);
        assert_eq!(env.stats.attempts, 1);
        let plan = env.payload.as_ref().and_then(Payload::as_facility).expect("plan");
        assert!(plan.is_complete());
        assert!(plan.sites.iter().all(|s| s.load <= 10.0 + 1e-9));
    }

    #[test]
    fn test_swarm_without_any_split_is_infeasible() {
        // total capacity 20 covers 18 units, but no site holds two 6s
        let instance = ProblemInstance::new(Problem::FacilityPso {
            customers: same_spot(&[6.0, 6.0, 6.0]),
            sites: NewSites::new(2).with_capacity(10.0),
        })
        .with_config(SolveConfig::default().with_seed(1).with_pso_iterations(5));
        let env = Solver::new().solve(&instance);
        assert_eq!(env.status, SolveStatus::Infeasible);
        assert!(!env.feasible);
        assert!(env.diagnostics.iter().any(|d| d.contains("no split")), "{:?}", env.diagnostics);
    }

    fn attempt_result(seed: u64, cost: f64, complete: bool) -> PsoResult {
        use crate::location::{CustomerAssignment, FacilityPlan};

        PsoResult {
            plan: FacilityPlan {
                sites: Vec::new(),
                assignments: vec![CustomerAssignment {
                    customer: "C1".into(),
                    facility: complete.then(|| "FAC1".to_string()),
                    demand: 1.0,
                }],
                flows: Vec::new(),
                fixed_cost: 0.0,
                transport_cost: cost,
                penalty: 0.0,
                total_cost: cost,
            },
            best_position: Vec::new(),
            best_cost: cost,
            generations: 1,
            termination: PsoTermination::Iterations,
            history: vec![cost],
            seed,
        }
    }

    #[test]
    fn test_retries_advance_seed_until_complete() {
        let mut seen = Vec::new();
        let (best, attempts) = cheapest_attempt(40, 5, &SolveContext::unbounded(), |seed| {
            seen.push(seed);
            Ok(match seed - 40 {
                0 => attempt_result(seed, 3e6, false),
                1 => attempt_result(seed, 2e6, false),
                _ => attempt_result(seed, 50.0, true),
            })
        })
        .expect("runs");
        assert_eq!(seen, vec![40, 41, 42]);
        assert_eq!(attempts, 3);
        assert_eq!(best.seed, 42);
        assert!(best.plan.is_complete());
    }

    #[test]
    fn test_retries_keep_cheapest_when_all_fall_short() {
        let costs = [2e6, 1e6 + 5.0, 1e6 + 9.0];
        let (best, attempts) = cheapest_attempt(u64::MAX, 2, &SolveContext::unbounded(), |seed| {
            let k = seed.wrapping_sub(u64::MAX) as usize;
            Ok(attempt_result(seed, costs[k], false))
        })
        .expect("runs");
        assert_eq!(attempts, 3);
        // seeds wrap: MAX, 0, 1
        assert_eq!(best.seed, 0);
        assert_eq!(best.best_cost, 1e6 + 5.0);
    }

    #[test]
    fn test_retries_stop_on_error() {
        let mut calls = 0;
        let err = cheapest_attempt(1, 4, &SolveContext::unbounded(), |_| {
            calls += 1;
            Err::<PsoResult, _>(SolveError::infeasible("short"))
        })
        .unwrap_err();
        assert!(matches!(err, SolveError::Infeasible(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_no_retries_runs_once() {
        let (best, attempts) = cheapest_attempt(9, 0, &SolveContext::unbounded(), |seed| {
            Ok(attempt_result(seed, 2e6, false))
        })
        .expect("runs");
        assert_eq!((attempts, best.seed), (1, 9));
    }

    #[test]
    fn test_cancel_flag_stops_vrp() {
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::Relaxed);
        let customers = vec![Customer::new("C1", Point::new(1.0, 0.0), 1.0)];
        let env = Solver::new().with_cancel_flag(flag).solve(&vrp(customers, 1));
        assert_eq!(env.status, SolveStatus::TimeLimitReached);
        let plan = env.payload.as_ref().and_then(Payload::as_routes).expect("routes");
        assert_eq!(plan.routes.len(), 1);
    }

    #[test]
    fn test_zero_deadline_milp_keeps_warm_start() {
        let instance = ProblemInstance::new(Problem::FacilityMilp {
            facilities: vec![
                CandidateFacility::new("F1", Point::new(0.0, 0.0), 5.0, 100.0),
                CandidateFacility::new("F2", Point::new(10.0, 0.0), 5.0, 100.0),
            ],
            customers: vec![
                Customer::new("C1", Point::new(1.0, 0.0), 10.0),
                Customer::new("C2", Point::new(9.0, 0.0), 10.0),
            ],
        })
        .with_config(SolveConfig::default().with_time_limit(0.0));
        let env = Solver::new().solve(&instance);
        assert_eq!(env.status, SolveStatus::TimeLimitReached);
        assert!(env.feasible);
        assert!(env.objective.is_some());
        assert_eq!(env.stats.termination.as_deref(), Some("time-limit"));
    }

    #[test]
    fn test_envelope_round_trips_through_csv() {
        let env = Solver::new().solve(&scenario_a());
        let text = env.to_csv_string().expect("write");
        let back = SolutionEnvelope::from_csv_str(&text).expect("read");
        assert_eq!(back, env);
    }

    #[test]
    fn test_logger_sees_final_status() {
        use std::sync::Mutex;
        let sink = Arc::new(Mutex::new(Vec::<String>::new()));
        let captured = sink.clone();
        let solver = Solver::new().with_logger(Arc::new(move |m: &str| {
            captured.lock().expect("lock").push(m.to_string());
        }));
        solver.solve(&vrp(vec![Customer::new("C1", Point::new(1.0, 0.0), 1.0)], 1));
        let lines = sink.lock().expect("lock");
        assert!(lines.last().expect("line").starts_with("vrp: feasible-non-optimal"));
    }
}
