//! Route and visit types.

/// A single visit within a route.
///
/// `node` indexes the routing network (0 is the depot, so visits always
/// hold indices `>= 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    /// Network index of the visited customer.
    pub node: usize,
    /// Arrival time at the customer.
    pub arrival_time: f64,
    /// Service start (arrival plus waiting).
    pub service_start: f64,
    /// Departure time (service start plus service duration).
    pub departure_time: f64,
    /// Cumulative load after this visit.
    pub load_after: f64,
}

/// An ordered sequence of visits assigned to one vehicle.
///
/// A route starts and ends at the depot (not stored in `visits`). A route
/// without visits is the explicit marker of an unused vehicle.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::{Route, Visit};
///
/// let mut route = Route::new(0);
/// assert!(route.is_empty());
/// route.push_visit(Visit {
///     node: 1,
///     arrival_time: 10.0,
///     service_start: 10.0,
///     departure_time: 20.0,
///     load_after: 10.0,
/// });
/// assert_eq!(route.len(), 1);
/// assert_eq!(route.vehicle_index(), 0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    vehicle_index: usize,
    visits: Vec<Visit>,
    total_distance: f64,
    total_duration: f64,
    drive_time: f64,
    total_load: f64,
    cost: f64,
}

impl Route {
    /// Creates an empty route for the vehicle at `vehicle_index` in the fleet.
    pub fn new(vehicle_index: usize) -> Self {
        Self {
            vehicle_index,
            visits: Vec::new(),
            total_distance: 0.0,
            total_duration: 0.0,
            drive_time: 0.0,
            total_load: 0.0,
            cost: 0.0,
        }
    }

    /// Appends a visit.
    pub fn push_visit(&mut self, visit: Visit) {
        self.total_load = visit.load_after;
        self.visits.push(visit);
    }

    pub fn vehicle_index(&self) -> usize {
        self.vehicle_index
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    /// Number of customer visits.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Returns `true` for the unused-vehicle marker.
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Network indices in visit order.
    pub fn nodes(&self) -> Vec<usize> {
        self.visits.iter().map(|v| v.node).collect()
    }

    /// Depot to depot distance.
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Elapsed time from departure to return, waiting included.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Travel time only.
    pub fn drive_time(&self) -> f64 {
        self.drive_time
    }

    pub fn total_load(&self) -> f64 {
        self.total_load
    }

    /// Distance priced at the vehicle's cost per distance.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub(crate) fn set_metrics(&mut self, distance: f64, duration: f64, drive_time: f64, cost: f64) {
        self.total_distance = distance;
        self.total_duration = duration;
        self.drive_time = drive_time;
        self.cost = cost;
    }
}
