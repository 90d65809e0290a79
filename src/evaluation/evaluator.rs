//! Route evaluator that computes timing, load, and feasibility.

use crate::models::{Route, RoutingNetwork, RoutingSolution, Vehicle, Visit, LOAD_EPS, TIME_EPS};

/// A constraint broken by a route.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Cumulative load above the vehicle capacity.
    CapacityExceeded {
        /// Fleet index of the vehicle.
        vehicle_index: usize,
        /// Load that exceeded capacity.
        load: f64,
        /// Vehicle capacity.
        capacity: f64,
    },
    /// Arrival after the customer's window closed.
    TimeWindowViolated {
        /// Network index of the customer.
        node: usize,
        /// Actual arrival time.
        arrival: f64,
        /// Window close.
        latest: f64,
    },
    /// Return to the depot after it closes.
    DepotClosed {
        vehicle_index: usize,
        arrival: f64,
        latest: f64,
    },
    /// Elapsed route time above the vehicle limit.
    MaxDurationExceeded {
        vehicle_index: usize,
        duration: f64,
        max_duration: f64,
    },
    /// Driving time above the vehicle limit.
    MaxDriveTimeExceeded {
        vehicle_index: usize,
        drive_time: f64,
        max_drive_time: f64,
    },
}

/// Evaluates routes of one vehicle: visit timing, cumulative load, distance,
/// drive time and the hard constraints (capacity, time windows, depot hours,
/// duration and drive-time limits).
///
/// Routes leave the depot when it opens. Waiting for a window to open counts
/// toward the route duration but not toward drive time.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::{Customer, Depot, Point, RoutingNetwork, Vehicle};
/// use u_netdesign::distance::{DistanceMatrix, DistanceMode};
/// use u_netdesign::evaluation::RouteEvaluator;
///
/// let depot = Depot::new("D", Point::new(0.0, 0.0));
/// let customers = vec![
///     Customer::new("C1", Point::new(3.0, 4.0), 10.0),
///     Customer::new("C2", Point::new(6.0, 8.0), 20.0),
/// ];
/// let pts = [depot.location(), customers[0].location(), customers[1].location()];
/// let dm = DistanceMatrix::from_points(&pts, DistanceMode::Euclidean).unwrap();
/// let net = RoutingNetwork::new(depot, customers, dm, 1.0);
/// let vehicle = Vehicle::new("V1", 100.0);
///
/// let evaluator = RouteEvaluator::new(&net, &vehicle, 0);
/// let (route, violations) = evaluator.build_route(&[1, 2]);
/// assert_eq!(route.len(), 2);
/// assert!(violations.is_empty());
/// assert!((route.total_distance() - 20.0).abs() < 1e-10);
/// ```
pub struct RouteEvaluator<'a> {
    network: &'a RoutingNetwork,
    vehicle: &'a Vehicle,
    vehicle_index: usize,
}

impl<'a> RouteEvaluator<'a> {
    /// Creates an evaluator for the vehicle at `vehicle_index` in the fleet.
    pub fn new(network: &'a RoutingNetwork, vehicle: &'a Vehicle, vehicle_index: usize) -> Self {
        Self {
            network,
            vehicle,
            vehicle_index,
        }
    }

    /// Builds a route from a sequence of network indices, computing timing
    /// and load, and lists every constraint it breaks.
    pub fn build_route(&self, nodes: &[usize]) -> (Route, Vec<Violation>) {
        let net = self.network;
        let mut route = Route::new(self.vehicle_index);
        let mut violations = Vec::new();
        let start_time = net.depot().open_time();
        let mut time = start_time;
        let mut load = 0.0;
        let mut distance = 0.0;
        let mut drive = 0.0;
        let mut prev = 0;

        for &node in nodes {
            distance += net.distance(prev, node);
            let travel = net.travel_time(prev, node);
            drive += travel;
            let arrival = time + travel;

            let service_start = match net.time_window(node) {
                Some(tw) => {
                    if tw.is_violated(arrival) {
                        violations.push(Violation::TimeWindowViolated {
                            node,
                            arrival,
                            latest: tw.latest(),
                        });
                    }
                    arrival + tw.waiting_time(arrival)
                }
                None => arrival,
            };
            let departure = service_start + net.service_duration(node);
            load += net.demand(node);

            route.push_visit(Visit {
                node,
                arrival_time: arrival,
                service_start,
                departure_time: departure,
                load_after: load,
            });

            time = departure;
            prev = node;
        }

        if !nodes.is_empty() {
            distance += net.distance(prev, 0);
            let travel = net.travel_time(prev, 0);
            drive += travel;
            time += travel;
        }
        let duration = time - start_time;

        if load > self.vehicle.capacity() + LOAD_EPS {
            violations.push(Violation::CapacityExceeded {
                vehicle_index: self.vehicle_index,
                load,
                capacity: self.vehicle.capacity(),
            });
        }
        if let Some(tw) = net.time_window(0) {
            if tw.is_violated(time) {
                violations.push(Violation::DepotClosed {
                    vehicle_index: self.vehicle_index,
                    arrival: time,
                    latest: tw.latest(),
                });
            }
        }
        if let Some(max) = self.vehicle.max_duration() {
            if duration > max + TIME_EPS {
                violations.push(Violation::MaxDurationExceeded {
                    vehicle_index: self.vehicle_index,
                    duration,
                    max_duration: max,
                });
            }
        }
        if let Some(max) = self.vehicle.max_drive_time() {
            if drive > max + TIME_EPS {
                violations.push(Violation::MaxDriveTimeExceeded {
                    vehicle_index: self.vehicle_index,
                    drive_time: drive,
                    max_drive_time: max,
                });
            }
        }

        route.set_metrics(distance, duration, drive, distance * self.vehicle.cost_per_distance());
        (route, violations)
    }

    /// Returns `true` if the sequence breaks no hard constraint.
    ///
    /// Same rules as [`RouteEvaluator::build_route`], without allocating and
    /// stopping at the first violation.
    pub fn is_feasible(&self, nodes: &[usize]) -> bool {
        let net = self.network;
        let load: f64 = nodes.iter().map(|&n| net.demand(n)).sum();
        if load > self.vehicle.capacity() + LOAD_EPS {
            return false;
        }

        let start_time = net.depot().open_time();
        let mut time = start_time;
        let mut drive = 0.0;
        let mut prev = 0;
        for &node in nodes {
            let travel = net.travel_time(prev, node);
            drive += travel;
            let arrival = time + travel;
            let service_start = match net.time_window(node) {
                Some(tw) if tw.is_violated(arrival) => return false,
                Some(tw) => arrival + tw.waiting_time(arrival),
                None => arrival,
            };
            time = service_start + net.service_duration(node);
            prev = node;
        }
        if !nodes.is_empty() {
            let travel = net.travel_time(prev, 0);
            drive += travel;
            time += travel;
        }

        if net.time_window(0).is_some_and(|tw| tw.is_violated(time)) {
            return false;
        }
        if self
            .vehicle
            .max_duration()
            .is_some_and(|max| time - start_time > max + TIME_EPS)
        {
            return false;
        }
        if self
            .vehicle
            .max_drive_time()
            .is_some_and(|max| drive > max + TIME_EPS)
        {
            return false;
        }
        true
    }

    /// Depot-to-depot distance of a sequence priced at the vehicle's rate.
    pub fn cost(&self, nodes: &[usize]) -> f64 {
        route_distance(self.network, nodes) * self.vehicle.cost_per_distance()
    }

    pub fn vehicle(&self) -> &Vehicle {
        self.vehicle
    }
}

/// Depot-to-depot distance of a sequence of network indices.
pub fn route_distance(network: &RoutingNetwork, nodes: &[usize]) -> f64 {
    if nodes.is_empty() {
        return 0.0;
    }
    let mut total = network.distance(0, nodes[0]);
    for w in nodes.windows(2) {
        total += network.distance(w[0], w[1]);
    }
    total + network.distance(nodes[nodes.len() - 1], 0)
}

/// Re-evaluates every route of a solution from scratch and collects all
/// violations. An empty result means the route set is feasible.
pub fn audit_solution(
    network: &RoutingNetwork,
    vehicles: &[Vehicle],
    solution: &RoutingSolution,
) -> Vec<Violation> {
    solution
        .routes()
        .iter()
        .flat_map(|route| {
            let idx = route.vehicle_index();
            RouteEvaluator::new(network, &vehicles[idx], idx)
                .build_route(&route.nodes())
                .1
        })
        .collect()
}
