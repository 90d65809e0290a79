//! Route sets and unplaced customers.

use serde::{Deserialize, Serialize};

use super::Route;

/// Why a customer could not be placed on any route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnassignedReason {
    /// Demand exceeds the capacity of every vehicle.
    Capacity,
    /// The time window cannot be met even on a dedicated route.
    TimeWindow,
    /// A dedicated route would break a duration or drive-time limit.
    RouteLimit,
    /// Feasible on its own, but no route with room remains in the fleet.
    FleetExhausted,
    /// The deadline passed before the customer was considered.
    TimeLimit,
}

impl UnassignedReason {
    /// Stable text form, shared with the tabular export.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::TimeWindow => "time-window",
            Self::RouteLimit => "route-limit",
            Self::FleetExhausted => "fleet-exhausted",
            Self::TimeLimit => "time-limit",
        }
    }

    /// Parses the text form produced by [`UnassignedReason::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "capacity" => Some(Self::Capacity),
            "time-window" => Some(Self::TimeWindow),
            "route-limit" => Some(Self::RouteLimit),
            "fleet-exhausted" => Some(Self::FleetExhausted),
            "time-limit" => Some(Self::TimeLimit),
            _ => None,
        }
    }
}

/// A complete routing result: exactly one route per fleet vehicle (empty
/// routes mark unused vehicles) plus any customers that could not be placed.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::{RoutingSolution, Route, UnassignedReason};
///
/// let mut sol = RoutingSolution::with_fleet(2);
/// assert_eq!(sol.num_routes(), 2);
/// assert_eq!(sol.num_used(), 0);
/// sol.add_unassigned(3, UnassignedReason::Capacity);
/// assert_eq!(sol.unassigned().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSolution {
    routes: Vec<Route>,
    unassigned: Vec<(usize, UnassignedReason)>,
}

impl RoutingSolution {
    /// One empty route per vehicle.
    pub fn with_fleet(fleet_size: usize) -> Self {
        Self {
            routes: (0..fleet_size).map(Route::new).collect(),
            unassigned: Vec::new(),
        }
    }

    /// Builds a solution from routes that are already evaluated.
    pub fn from_routes(routes: Vec<Route>) -> Self {
        Self {
            routes,
            unassigned: Vec::new(),
        }
    }

    /// Records a customer that could not be placed.
    pub fn add_unassigned(&mut self, node: usize, reason: UnassignedReason) {
        self.unassigned.push((node, reason));
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Unplaced customers with the reason, by network index.
    pub fn unassigned(&self) -> &[(usize, UnassignedReason)] {
        &self.unassigned
    }

    /// Number of routes, used or not. Always the fleet size.
    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    /// Number of routes with at least one visit.
    pub fn num_used(&self) -> usize {
        self.routes.iter().filter(|r| !r.is_empty()).count()
    }

    /// Number of customers served across all routes.
    pub fn num_served(&self) -> usize {
        self.routes.iter().map(|r| r.len()).sum()
    }

    pub fn total_distance(&self) -> f64 {
        self.routes.iter().map(|r| r.total_distance()).sum()
    }

    pub fn total_duration(&self) -> f64 {
        self.routes.iter().map(|r| r.total_duration()).sum()
    }

    /// Sum of route costs; the routing objective.
    pub fn total_cost(&self) -> f64 {
        self.routes.iter().map(|r| r.cost()).sum()
    }

    /// Returns `true` when every customer is on a route.
    pub fn is_complete(&self) -> bool {
        self.unassigned.is_empty()
    }
}
