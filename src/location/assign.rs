//! Capacitated nearest-feasible-site assignment.
//!
//! The inner subproblem of the swarm search: given site coordinates, place
//! every customer at its nearest site that still has room. Customers are
//! handled largest demand first (input order among equal demands), so the
//! result depends only on the coordinates and the customer table.
//!
//! [`pack_exact`] settles whether the demand fits the sites at all when the
//! nearest-site pass cannot place everyone.

use serde::{Deserialize, Serialize};

use crate::models::{Customer, Point, LOAD_EPS};
use crate::quota::SolveContext;

/// Cost charged per customer left without a site.
pub const UNPLACED_PENALTY: f64 = 1e6;

/// Parameters shared by all sites of a swarm search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSites {
    /// Number of sites to place.
    pub count: usize,
    /// Capacity of each site; `None` for uncapacitated.
    pub capacity: Option<f64>,
    /// Charged once per site that serves at least one customer.
    pub fixed_cost: f64,
    /// Transport cost per unit of distance and per unit of weight.
    pub cost_per_distance: f64,
    /// When set, demand ships in whole loads of this size.
    pub units_per_load: Option<f64>,
}

impl Default for NewSites {
    fn default() -> Self {
        Self {
            count: 1,
            capacity: None,
            fixed_cost: 0.0,
            cost_per_distance: 1.0,
            units_per_load: None,
        }
    }
}

impl NewSites {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_fixed_cost(mut self, cost: f64) -> Self {
        self.fixed_cost = cost;
        self
    }

    pub fn with_cost_per_distance(mut self, cost: f64) -> Self {
        self.cost_per_distance = cost;
        self
    }

    pub fn with_units_per_load(mut self, units: f64) -> Self {
        self.units_per_load = Some(units);
        self
    }

    /// Shipping weight of a demand: whole loads when `units_per_load` is set.
    pub fn weight(&self, demand: f64) -> f64 {
        match self.units_per_load {
            Some(units) => (demand / units).ceil(),
            None => demand,
        }
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.count == 0 {
            return Err("at least one new site is required".into());
        }
        if let Some(cap) = self.capacity {
            if !(cap.is_finite() && cap > 0.0) {
                return Err(format!("site capacity must be positive, got {cap}"));
            }
        }
        if !(self.fixed_cost.is_finite() && self.fixed_cost >= 0.0) {
            return Err(format!("fixed_cost must be non-negative, got {}", self.fixed_cost));
        }
        if !(self.cost_per_distance.is_finite() && self.cost_per_distance >= 0.0) {
            return Err(format!(
                "cost_per_distance must be non-negative, got {}",
                self.cost_per_distance
            ));
        }
        if let Some(units) = self.units_per_load {
            if !(units.is_finite() && units > 0.0) {
                return Err(format!("units_per_load must be positive, got {units}"));
            }
        }
        Ok(())
    }
}

/// Outcome of [`greedy_assignment`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Site index per customer (input order); `None` if unplaced.
    pub site_of: Vec<Option<usize>>,
    /// Demand served per site.
    pub loads: Vec<f64>,
    /// Customers served per site.
    pub served: Vec<usize>,
    pub transport_cost: f64,
    pub fixed_cost: f64,
    pub unplaced: usize,
}

impl Assignment {
    pub fn penalty(&self) -> f64 {
        self.unplaced as f64 * UNPLACED_PENALTY
    }

    /// Fixed plus transport cost plus the unplaced penalty.
    pub fn total_cost(&self) -> f64 {
        self.fixed_cost + self.transport_cost + self.penalty()
    }

    pub fn is_complete(&self) -> bool {
        self.unplaced == 0
    }
}

/// Customer indices largest demand first, input order among ties.
pub fn demand_order(customers: &[Customer]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..customers.len()).collect();
    order.sort_by(|&a, &b| customers[b].demand().total_cmp(&customers[a].demand()));
    order
}

/// Places each customer (in `order`) at the nearest site with enough
/// remaining capacity.
///
/// A customer that fits nowhere triggers a repair: a customer already placed
/// at a site near it trades places with a smaller customer at another site,
/// making room. Customers still left over are unplaced.
///
/// Pure: no state survives between calls, so calls for different site sets
/// may run in parallel.
///
/// # Examples
///
/// ```
/// use u_netdesign::location::{demand_order, greedy_assignment, NewSites};
/// use u_netdesign::models::{Customer, Point};
///
/// let customers = vec![
///     Customer::new("A", Point::new(0.0, 0.0), 10.0),
///     Customer::new("B", Point::new(10.0, 0.0), 10.0),
/// ];
/// let sites = [Point::new(1.0, 0.0), Point::new(9.0, 0.0)];
/// let params = NewSites::new(2).with_capacity(10.0).with_fixed_cost(5.0);
///
/// let a = greedy_assignment(&sites, &customers, &demand_order(&customers), Point::euclidean, &params);
/// assert_eq!(a.site_of, vec![Some(0), Some(1)]);
/// assert!((a.total_cost() - (10.0 + 10.0 + 10.0)).abs() < 1e-9);
/// ```
pub fn greedy_assignment(
    sites: &[Point],
    customers: &[Customer],
    order: &[usize],
    metric: fn(&Point, &Point) -> f64,
    params: &NewSites,
) -> Assignment {
    let mut site_of = vec![None; customers.len()];
    let mut loads = vec![0.0; sites.len()];
    let mut left = Vec::new();
    let mut ranked: Vec<(f64, usize)> = Vec::with_capacity(sites.len());

    for &c in order {
        let demand = customers[c].demand();
        rank_sites(&customers[c].location(), sites, metric, &mut ranked);
        let fits = |s: usize| params.capacity.is_none_or(|cap| loads[s] + demand <= cap + LOAD_EPS);
        match ranked.iter().find(|&&(_, s)| fits(s)) {
            Some(&(_, s)) => {
                loads[s] += demand;
                site_of[c] = Some(s);
            }
            None => left.push(c),
        }
    }

    if let Some(cap) = params.capacity {
        let mut repair = Repair {
            sites,
            customers,
            metric,
            cap,
            site_of: &mut site_of,
            loads: &mut loads,
        };
        for c in left {
            rank_sites(&customers[c].location(), sites, metric, &mut ranked);
            repair.make_room(c, &ranked);
        }
    }

    fixed_assignment(sites, customers, site_of, metric, params)
}

/// Tallies loads and costs of a given customer-to-site mapping.
pub fn fixed_assignment(
    sites: &[Point],
    customers: &[Customer],
    site_of: Vec<Option<usize>>,
    metric: fn(&Point, &Point) -> f64,
    params: &NewSites,
) -> Assignment {
    let mut loads = vec![0.0; sites.len()];
    let mut served = vec![0usize; sites.len()];
    let mut transport_cost = 0.0;
    let mut unplaced = 0;
    for (customer, site) in customers.iter().zip(&site_of) {
        match *site {
            Some(s) => {
                loads[s] += customer.demand();
                served[s] += 1;
                transport_cost += metric(&customer.location(), &sites[s])
                    * params.cost_per_distance
                    * params.weight(customer.demand());
            }
            None => unplaced += 1,
        }
    }

    let fixed_cost = served.iter().filter(|&&n| n > 0).count() as f64 * params.fixed_cost;
    Assignment {
        site_of,
        loads,
        served,
        transport_cost,
        fixed_cost,
        unplaced,
    }
}

/// Sites by distance from `from`, index order among ties.
fn rank_sites(from: &Point, sites: &[Point], metric: fn(&Point, &Point) -> f64, out: &mut Vec<(f64, usize)>) {
    out.clear();
    out.extend(sites.iter().enumerate().map(|(s, p)| (metric(from, p), s)));
    out.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
}

struct Repair<'a> {
    sites: &'a [Point],
    customers: &'a [Customer],
    metric: fn(&Point, &Point) -> f64,
    cap: f64,
    site_of: &'a mut [Option<usize>],
    loads: &'a mut [f64],
}

impl Repair<'_> {
    /// Frees room for customer `c` at the nearest site where one swap
    /// suffices, then places it. Returns `false` when none does.
    fn make_room(&mut self, c: usize, ranked: &[(f64, usize)]) -> bool {
        let demand = self.customers[c].demand();
        for &(_, s) in ranked {
            let need = self.loads[s] + demand - self.cap;
            if need <= LOAD_EPS || self.swap_out(s, need) {
                self.place(c, s);
                return true;
            }
        }
        false
    }

    fn place(&mut self, c: usize, s: usize) {
        if let Some(old) = self.site_of[c] {
            self.loads[old] -= self.customers[c].demand();
        }
        self.loads[s] += self.customers[c].demand();
        self.site_of[c] = Some(s);
    }

    fn extra_distance(&self, j: usize, from: usize, to: usize) -> f64 {
        let at = self.customers[j].location();
        (self.metric)(&at, &self.sites[to]) - (self.metric)(&at, &self.sites[from])
    }

    /// Trades a customer `j` at `s` for a smaller customer `i` elsewhere so
    /// that `s` gains at least `need`, choosing the smallest detour.
    fn swap_out(&mut self, s: usize, need: f64) -> bool {
        let mut best: Option<(f64, usize, usize, usize)> = None;
        let n = self.customers.len();
        for j in (0..n).filter(|&j| self.site_of[j] == Some(s)) {
            let dj = self.customers[j].demand();
            for i in 0..n {
                let Some(t) = self.site_of[i].filter(|&t| t != s) else {
                    continue;
                };
                let di = self.customers[i].demand();
                if dj - di + LOAD_EPS < need || self.loads[t] - di + dj > self.cap + LOAD_EPS {
                    continue;
                }
                let extra = self.extra_distance(j, s, t) + self.extra_distance(i, t, s);
                if best.is_none_or(|(b, _, _, _)| extra < b) {
                    best = Some((extra, j, i, t));
                }
            }
        }
        match best {
            Some((_, j, i, t)) => {
                self.place(j, t);
                self.place(i, s);
                true
            }
            None => false,
        }
    }
}

/// Outcome of [`pack_exact`].
#[derive(Debug, Clone, PartialEq)]
pub enum Packing {
    /// Site index per customer (input order).
    Found(Vec<usize>),
    /// No split of the demand fits the sites.
    Impossible,
    /// The deadline passed before the search finished.
    Stopped,
}

/// Decides whether the demand splits across `count` sites of equal
/// `capacity`, ignoring distances.
///
/// Depth-first search over customers in `order`; a customer is never tried
/// in a site whose load equals that of an earlier site, since the subtrees
/// are the same up to relabeling. Checks `ctx` on the first node and every
/// 4096 nodes after.
pub fn pack_exact(
    customers: &[Customer],
    order: &[usize],
    count: usize,
    capacity: f64,
    ctx: &SolveContext,
) -> Packing {
    let n = order.len();
    let mut bin_at = vec![0usize; n];
    let mut next = vec![0usize; n + 1];
    let mut loads = vec![0.0; count];
    let mut depth = 0;
    let mut nodes = 0u64;

    while depth < n {
        nodes += 1;
        if nodes % 4096 == 1 && ctx.is_stopped() {
            return Packing::Stopped;
        }

        let demand = customers[order[depth]].demand();
        let mut placed = false;
        while next[depth] < count {
            let b = next[depth];
            next[depth] += 1;
            let fits = loads[b] + demand <= capacity + LOAD_EPS;
            let repeat = loads[..b].iter().any(|&l| (l - loads[b]).abs() <= LOAD_EPS);
            if fits && !repeat {
                loads[b] += demand;
                bin_at[depth] = b;
                depth += 1;
                next[depth] = 0;
                placed = true;
                break;
            }
        }
        if !placed {
            if depth == 0 {
                return Packing::Impossible;
            }
            depth -= 1;
            loads[bin_at[depth]] -= customers[order[depth]].demand();
        }
    }

    let mut site_of = vec![0; customers.len()];
    for (depth, &c) in order.iter().enumerate() {
        site_of[c] = bin_at[depth];
    }
    Packing::Found(site_of)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers() -> Vec<Customer> {
        vec![
            Customer::new("A", Point::new(0.0, 0.0), 5.0),
            Customer::new("B", Point::new(1.0, 0.0), 8.0),
            Customer::new("C", Point::new(10.0, 0.0), 5.0),
        ]
    }

    #[test]
    fn test_demand_order_stable() {
        let order = demand_order(&customers());
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_uncapacitated_nearest() {
        let cs = customers();
        let sites = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let a = greedy_assignment(&sites, &cs, &demand_order(&cs), Point::euclidean, &NewSites::new(2));
        assert_eq!(a.site_of, vec![Some(0), Some(0), Some(1)]);
        assert_eq!(a.loads, vec![13.0, 5.0]);
        assert!((a.transport_cost - 8.0).abs() < 1e-9);
        assert!(a.is_complete());
    }

    #[test]
    fn test_capacity_pushes_to_next_site() {
        let cs = customers();
        let sites = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let params = NewSites::new(2).with_capacity(10.0);
        let a = greedy_assignment(&sites, &cs, &demand_order(&cs), Point::euclidean, &params);
        // B (8) takes site 0 first; A (5) no longer fits there.
        assert_eq!(a.site_of, vec![Some(1), Some(0), Some(1)]);
        assert!((a.transport_cost - (8.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_unplaced_penalized() {
        let cs = customers();
        let sites = [Point::new(0.0, 0.0)];
        let params = NewSites::new(1).with_capacity(10.0).with_fixed_cost(3.0);
        let a = greedy_assignment(&sites, &cs, &demand_order(&cs), Point::euclidean, &params);
        assert_eq!(a.unplaced, 2);
        assert_eq!(a.site_of, vec![None, Some(0), None]);
        assert!((a.total_cost() - (3.0 + 8.0 + 2.0 * UNPLACED_PENALTY)).abs() < 1e-6);
    }

    #[test]
    fn test_whole_loads() {
        let cs = vec![Customer::new("A", Point::new(2.0, 0.0), 25.0)];
        let sites = [Point::new(0.0, 0.0)];
        let params = NewSites::new(1).with_units_per_load(10.0).with_cost_per_distance(1.5);
        let a = greedy_assignment(&sites, &cs, &demand_order(&cs), Point::euclidean, &params);
        // 3 loads over 2 units of distance at 1.5.
        assert!((a.transport_cost - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_unused_site_has_no_fixed_cost() {
        let cs = vec![Customer::new("A", Point::new(0.0, 0.0), 1.0)];
        let sites = [Point::new(0.0, 0.0), Point::new(50.0, 50.0)];
        let params = NewSites::new(2).with_fixed_cost(100.0);
        let a = greedy_assignment(&sites, &cs, &demand_order(&cs), Point::euclidean, &params);
        assert!((a.fixed_cost - 100.0).abs() < 1e-9);
        assert_eq!(a.served, vec![1, 0]);
    }

    fn same_spot(demands: &[f64]) -> Vec<Customer> {
        demands
            .iter()
            .enumerate()
            .map(|(i, &d)| Customer::new(format!("C{i}"), Point::new(0.0, 0.0), d))
            .collect()
    }

    #[test]
    fn test_swap_makes_room_for_leftover() {
        // first fit leaves 2 over (5+4 | 3+3+3); trading 4 for a 3 fits it
        let cs = same_spot(&[5.0, 4.0, 3.0, 3.0, 3.0, 2.0]);
        let sites = [Point::new(0.0, 0.0), Point::new(0.0, 0.0)];
        let params = NewSites::new(2).with_capacity(10.0);
        let a = greedy_assignment(&sites, &cs, &demand_order(&cs), Point::euclidean, &params);
        assert!(a.is_complete());
        assert_eq!(a.loads, vec![10.0, 10.0]);
        assert_eq!(a.served.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_fixed_assignment_tallies_mapping() {
        let cs = customers();
        let sites = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let params = NewSites::new(2).with_fixed_cost(2.0);
        let a = fixed_assignment(&sites, &cs, vec![Some(1), Some(0), None], Point::euclidean, &params);
        assert_eq!(a.loads, vec![8.0, 5.0]);
        assert_eq!(a.unplaced, 1);
        assert!((a.transport_cost - (50.0 + 8.0)).abs() < 1e-9);
        assert!((a.fixed_cost - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_pack_exact_finds_split_first_fit_misses() {
        // first fit: 4+4 | 3+3+3, leaving a 3 over; 4+3+3 twice fits
        let cs = same_spot(&[4.0, 4.0, 3.0, 3.0, 3.0, 3.0]);
        let order = demand_order(&cs);
        let Packing::Found(site_of) = pack_exact(&cs, &order, 2, 10.0, &SolveContext::unbounded()) else {
            panic!("expected a packing");
        };
        let mut loads = [0.0; 2];
        for (c, &s) in site_of.iter().enumerate() {
            loads[s] += cs[c].demand();
        }
        assert_eq!(loads, [10.0, 10.0]);
    }

    #[test]
    fn test_pack_exact_proves_impossible() {
        // 18 units fit 2 × 10 in total, but no two 6s share a site
        let cs = same_spot(&[6.0, 6.0, 6.0]);
        let order = demand_order(&cs);
        assert_eq!(pack_exact(&cs, &order, 2, 10.0, &SolveContext::unbounded()), Packing::Impossible);
    }

    #[test]
    fn test_pack_exact_honours_deadline() {
        use crate::quota::TimeQuota;
        use crate::telemetry::silent_logger;
        use std::sync::Arc;

        let ctx = SolveContext::new(Arc::new(TimeQuota::new(0.0)), silent_logger());
        let cs = same_spot(&[6.0, 6.0, 6.0]);
        assert_eq!(pack_exact(&cs, &demand_order(&cs), 2, 10.0, &ctx), Packing::Stopped);
    }

    #[test]
    fn test_validate() {
        assert!(NewSites::new(2).validate().is_ok());
        assert!(NewSites::new(0).validate().is_err());
        assert!(NewSites::new(1).with_capacity(0.0).validate().is_err());
        assert!(NewSites::new(1).with_units_per_load(-1.0).validate().is_err());
    }
}
