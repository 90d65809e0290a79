//! Swarm search loop.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use u_numflow::random::create_rng;

use crate::error::SolveError;
use crate::models::{Customer, Point, LOAD_EPS};
use crate::quota::SolveContext;

use super::super::assign::{
    demand_order, fixed_assignment, greedy_assignment, pack_exact, Assignment, NewSites, Packing,
};
use super::super::plan::{CustomerAssignment, FacilityPlan, Flow, SiteReport};
use super::config::PsoConfig;

/// Distance function used by the swarm.
pub type Metric = fn(&Point, &Point) -> f64;

/// Why the swarm stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PsoTermination {
    /// All configured generations ran.
    Iterations,
    /// The global best did not improve for `stagnation_limit` generations.
    Stagnation,
    /// The deadline passed or the solve was cancelled.
    TimeLimit,
}

impl PsoTermination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iterations => "iterations",
            Self::Stagnation => "stagnation",
            Self::TimeLimit => "time-limit",
        }
    }
}

/// Result of a swarm run.
#[derive(Debug, Clone, PartialEq)]
pub struct PsoResult {
    /// Plan induced by the best site coordinates.
    pub plan: FacilityPlan,

    /// Best site coordinates found.
    pub best_position: Vec<Point>,

    /// Cost of the best position (penalty included).
    pub best_cost: f64,

    /// Number of completed generations.
    pub generations: usize,

    pub termination: PsoTermination,

    /// Global best at the end of each generation.
    pub history: Vec<f64>,

    /// Seed the run used, drawn at random when none was configured.
    pub seed: u64,
}

/// Axis-aligned search box.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min: Point,
    max: Point,
}

impl Bounds {
    /// Customer extent widened by `margin` of each side's length (at least
    /// 1e-3 absolute); geographic boxes are cut at the poles and the
    /// antimeridian.
    fn around(customers: &[Customer], margin: f64, geographic: bool) -> Self {
        let (mut min, mut max) = (
            Point::new(f64::INFINITY, f64::INFINITY),
            Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        );
        for c in customers {
            let p = c.location();
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        let pad_x = (margin * (max.x - min.x)).max(1e-3);
        let pad_y = (margin * (max.y - min.y)).max(1e-3);
        let bounds = Self {
            min: Point::new(min.x - pad_x, min.y - pad_y),
            max: Point::new(max.x + pad_x, max.y + pad_y),
        };
        if geographic {
            let world = Self {
                min: Point::new(-180.0, -90.0),
                max: Point::new(180.0, 90.0),
            };
            Self {
                min: world.clamp(bounds.min),
                max: world.clamp(bounds.max),
            }
        } else {
            bounds
        }
    }

    fn span(&self) -> Point {
        Point::new(self.max.x - self.min.x, self.max.y - self.min.y)
    }

    fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(self.min.x, self.max.x), p.y.clamp(self.min.y, self.max.y))
    }
}

struct Particle {
    position: Vec<Point>,
    velocity: Vec<Point>,
    best_position: Vec<Point>,
    best_cost: f64,
}

/// Executes the facility swarm search.
///
/// # Algorithm
///
/// A particle is `K` site coordinates. Its fitness is the total cost of
/// [`greedy_assignment`] for those sites. Each generation:
///
/// ```text
/// v ← w_t·v + c1·r1·(pbest − x) + c2·r2·(gbest − x)
/// x ← clamp(x + v)
/// ```
///
/// with `r1`, `r2` drawn per coordinate. All draws happen sequentially
/// before fitness evaluation, so parallel and sequential runs agree.
///
/// # Reference
///
/// Kennedy, J. & Eberhart, R. (1995). "Particle swarm optimization",
/// *Proceedings of ICNN'95*, 1942-1948.
pub struct PsoRunner;

impl PsoRunner {
    /// Places `sites.count` facilities for `customers`.
    ///
    /// Returns [`SolveError::Infeasible`] when the sites cannot hold the
    /// demand at all (total capacity short, or a customer larger than one
    /// site). Otherwise the result is always a plan; customers the best
    /// position could not place are listed without a facility.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_netdesign::location::{NewSites, PsoConfig, PsoRunner};
    /// use u_netdesign::models::{Customer, Point};
    /// use u_netdesign::quota::SolveContext;
    ///
    /// let customers = vec![
    ///     Customer::new("A", Point::new(0.0, 0.0), 1.0),
    ///     Customer::new("B", Point::new(10.0, 0.0), 1.0),
    /// ];
    /// let config = PsoConfig::default().with_particles(10).with_iterations(30).with_seed(7);
    /// let result = PsoRunner::run(
    ///     &customers, &NewSites::new(2), Point::euclidean, &config, &SolveContext::unbounded(),
    /// ).unwrap();
    /// assert!(result.plan.is_complete());
    /// assert!(result.best_cost < 10.0);
    /// ```
    pub fn run(
        customers: &[Customer],
        sites: &NewSites,
        metric: Metric,
        config: &PsoConfig,
        ctx: &SolveContext,
    ) -> Result<PsoResult, SolveError> {
        config.validate().map_err(SolveError::InvalidInput)?;
        sites.validate().map_err(SolveError::InvalidInput)?;
        if customers.is_empty() {
            return Err(SolveError::invalid("swarm search needs at least one customer"));
        }
        check_capacity(customers, sites)?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = create_rng(seed);
        let order = demand_order(customers);
        let bounds = Bounds::around(customers, config.bounds_margin, config.geographic);
        let span = bounds.span();
        let k = sites.count;
        let fitness =
            |position: &[Point]| greedy_assignment(position, customers, &order, metric, sites).total_cost();

        let mut swarm: Vec<Particle> = (0..config.particles)
            .map(|_| {
                let position: Vec<Point> = (0..k)
                    .map(|_| {
                        Point::new(
                            bounds.min.x + rng.random_range(0.0..1.0) * span.x,
                            bounds.min.y + rng.random_range(0.0..1.0) * span.y,
                        )
                    })
                    .collect();
                let velocity: Vec<Point> = (0..k)
                    .map(|_| {
                        Point::new(
                            (rng.random_range(0.0..1.0) * 2.0 - 1.0) * config.initial_velocity * span.x,
                            (rng.random_range(0.0..1.0) * 2.0 - 1.0) * config.initial_velocity * span.y,
                        )
                    })
                    .collect();
                Particle {
                    best_position: position.clone(),
                    position,
                    velocity,
                    best_cost: f64::INFINITY,
                }
            })
            .collect();

        let costs = evaluate(&swarm, &fitness, config.parallel);
        for (p, cost) in swarm.iter_mut().zip(costs) {
            p.best_cost = cost;
        }
        let (mut global_best, mut global_cost) = best_of(&swarm);
        ctx.log(&format!(
            "pso: {} particles × {k} sites, seed {seed}, initial best {global_cost:.4}",
            config.particles
        ));

        let vmax = Point::new(config.max_velocity * span.x, config.max_velocity * span.y);
        let mut history = Vec::with_capacity(config.iterations);
        let mut stagnant = 0usize;
        let mut generations = 0usize;
        let mut termination = PsoTermination::Iterations;

        for gen in 0..config.iterations {
            if ctx.is_stopped() {
                termination = PsoTermination::TimeLimit;
                break;
            }

            let w = config.inertia.weight(gen);
            for p in swarm.iter_mut() {
                for d in 0..k {
                    let (r1x, r1y) = (rng.random_range(0.0..1.0), rng.random_range(0.0..1.0));
                    let (r2x, r2y) = (rng.random_range(0.0..1.0), rng.random_range(0.0..1.0));
                    let (x, v) = (p.position[d], p.velocity[d]);
                    let (pb, gb) = (p.best_position[d], global_best[d]);
                    let vx = w * v.x + config.cognitive * r1x * (pb.x - x.x) + config.social * r2x * (gb.x - x.x);
                    let vy = w * v.y + config.cognitive * r1y * (pb.y - x.y) + config.social * r2y * (gb.y - x.y);
                    let v = Point::new(vx.clamp(-vmax.x, vmax.x), vy.clamp(-vmax.y, vmax.y));
                    p.velocity[d] = v;
                    p.position[d] = bounds.clamp(Point::new(x.x + v.x, x.y + v.y));
                }
            }

            let costs = evaluate(&swarm, &fitness, config.parallel);
            for (p, cost) in swarm.iter_mut().zip(costs) {
                if cost < p.best_cost {
                    p.best_cost = cost;
                    p.best_position.clone_from(&p.position);
                }
            }

            let (candidate, candidate_cost) = best_of(&swarm);
            if candidate_cost < global_cost {
                global_best = candidate;
                global_cost = candidate_cost;
                stagnant = 0;
            } else {
                stagnant += 1;
            }
            history.push(global_cost);
            generations = gen + 1;

            if config.log_every > 0 && generations % config.log_every == 0 {
                ctx.log(&format!("pso: generation {generations}, best {global_cost:.4}, w {w:.3}"));
            }
            if config.stagnation_limit > 0 && stagnant >= config.stagnation_limit {
                termination = PsoTermination::Stagnation;
                break;
            }
        }

        let assignment = greedy_assignment(&global_best, customers, &order, metric, sites);
        ctx.log(&format!(
            "pso: stopped after {generations} generations ({}), best {global_cost:.4}, {} unplaced",
            termination.as_str(),
            assignment.unplaced
        ));
        let plan = to_plan(&global_best, customers, sites, &assignment);

        Ok(PsoResult {
            plan,
            best_position: global_best,
            best_cost: global_cost,
            generations,
            termination,
            history,
            seed,
        })
    }

    /// Finishes a run that left customers unplaced: splits the demand across
    /// the sites with [`pack_exact`] and moves each site to the
    /// demand-weighted centre of its customers.
    ///
    /// Returns [`SolveError::Infeasible`] when no split exists. Complete or
    /// uncapacitated runs come back unchanged; a run whose split search is
    /// cut by the deadline comes back marked [`PsoTermination::TimeLimit`].
    pub fn complete_by_packing(
        mut result: PsoResult,
        customers: &[Customer],
        sites: &NewSites,
        metric: Metric,
        ctx: &SolveContext,
    ) -> Result<PsoResult, SolveError> {
        let Some(cap) = sites.capacity.filter(|_| !result.plan.is_complete()) else {
            return Ok(result);
        };
        match pack_exact(customers, &demand_order(customers), sites.count, cap, ctx) {
            Packing::Impossible => Err(SolveError::infeasible(format!(
                "no split of the demand fits {} sites of capacity {cap}",
                sites.count
            ))),
            Packing::Stopped => {
                result.termination = PsoTermination::TimeLimit;
                Ok(result)
            }
            Packing::Found(bins) => {
                let position = centres(customers, &bins, &result.best_position);
                let site_of = bins.into_iter().map(Some).collect();
                let assignment = fixed_assignment(&position, customers, site_of, metric, sites);
                ctx.log(&format!(
                    "pso: placed sites on an exact demand split, cost {:.4}",
                    assignment.total_cost()
                ));
                result.plan = to_plan(&position, customers, sites, &assignment);
                result.best_cost = assignment.total_cost();
                result.best_position = position;
                Ok(result)
            }
        }
    }
}

/// Demand-weighted centre of each site's customers; sites without customers
/// keep their `fallback` position.
fn centres(customers: &[Customer], bins: &[usize], fallback: &[Point]) -> Vec<Point> {
    let mut sums = vec![(0.0, 0.0, 0.0, 0usize); fallback.len()];
    for (customer, &b) in customers.iter().zip(bins) {
        let p = customer.location();
        let w = customer.demand();
        let acc = &mut sums[b];
        acc.0 += w * p.x;
        acc.1 += w * p.y;
        acc.2 += w;
        acc.3 += 1;
    }
    fallback
        .iter()
        .enumerate()
        .map(|(s, &keep)| {
            let (wx, wy, w, n) = sums[s];
            if n == 0 {
                keep
            } else if w > LOAD_EPS {
                Point::new(wx / w, wy / w)
            } else {
                let members = customers.iter().zip(bins).filter(|&(_, &b)| b == s);
                let (x, y) = members.fold((0.0, 0.0), |(x, y), (c, _)| (x + c.location().x, y + c.location().y));
                Point::new(x / n as f64, y / n as f64)
            }
        })
        .collect()
}

/// Rejects site parameters that cannot hold the demand whatever the
/// coordinates.
fn check_capacity(customers: &[Customer], sites: &NewSites) -> Result<(), SolveError> {
    let Some(cap) = sites.capacity else {
        return Ok(());
    };
    let total: f64 = customers.iter().map(|c| c.demand()).sum();
    let available = cap * sites.count as f64;
    if available + LOAD_EPS < total {
        return Err(SolveError::infeasible(format!(
            "{} sites of capacity {cap} cannot hold total demand {total}",
            sites.count
        )));
    }
    if let Some(c) = customers.iter().find(|c| c.demand() > cap + LOAD_EPS) {
        return Err(SolveError::infeasible(format!(
            "demand {} of '{}' exceeds the site capacity {cap}",
            c.demand(),
            c.id()
        )));
    }
    Ok(())
}

/// Best personal best in the swarm; first index wins ties.
fn best_of(swarm: &[Particle]) -> (Vec<Point>, f64) {
    let mut best = 0;
    for (i, p) in swarm.iter().enumerate() {
        if p.best_cost < swarm[best].best_cost {
            best = i;
        }
    }
    (swarm[best].best_position.clone(), swarm[best].best_cost)
}

#[cfg(feature = "parallel")]
fn evaluate<F>(swarm: &[Particle], fitness: &F, parallel: bool) -> Vec<f64>
where
    F: Fn(&[Point]) -> f64 + Sync,
{
    if parallel {
        swarm.par_iter().map(|p| fitness(&p.position)).collect()
    } else {
        swarm.iter().map(|p| fitness(&p.position)).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn evaluate<F>(swarm: &[Particle], fitness: &F, _parallel: bool) -> Vec<f64>
where
    F: Fn(&[Point]) -> f64,
{
    swarm.iter().map(|p| fitness(&p.position)).collect()
}

/// Site ids of new facilities.
fn site_id(index: usize) -> String {
    format!("FAC{}", index + 1)
}

fn to_plan(position: &[Point], customers: &[Customer], sites: &NewSites, a: &Assignment) -> FacilityPlan {
    let reports: Vec<SiteReport> = position
        .iter()
        .enumerate()
        .map(|(s, &location)| SiteReport {
            id: site_id(s),
            location,
            open: a.served[s] > 0,
            load: a.loads[s],
            capacity: sites.capacity,
            fixed_cost: sites.fixed_cost,
        })
        .collect();

    let mut assignments = Vec::with_capacity(customers.len());
    let mut flows = Vec::new();
    for (c, customer) in customers.iter().enumerate() {
        let facility = a.site_of[c].map(site_id);
        if let Some(f) = &facility {
            flows.push(Flow {
                facility: f.clone(),
                customer: customer.id().to_string(),
                amount: customer.demand(),
            });
        }
        assignments.push(CustomerAssignment {
            customer: customer.id().to_string(),
            facility,
            demand: customer.demand(),
        });
    }

    FacilityPlan {
        sites: reports,
        assignments,
        flows,
        fixed_cost: a.fixed_cost,
        transport_cost: a.transport_cost,
        penalty: a.penalty(),
        total_cost: a.total_cost(),
    }
}
