//! The routing network: depot, customers and travel metrics in one index space.

use crate::distance::DistanceMatrix;

use super::{Customer, Depot, TimeWindow};

/// Locations of a routing problem with their travel metrics.
///
/// Index 0 is the depot and index `i >= 1` is `customers[i - 1]`; the
/// distance matrix uses the same indexing. Travel time is distance divided
/// by `speed`.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::{Customer, Depot, Point, RoutingNetwork};
/// use u_netdesign::distance::{DistanceMatrix, DistanceMode};
///
/// let depot = Depot::new("D", Point::new(0.0, 0.0));
/// let customers = vec![Customer::new("C1", Point::new(3.0, 4.0), 10.0)];
/// let dm = DistanceMatrix::from_points(
///     &[depot.location(), customers[0].location()],
///     DistanceMode::Euclidean,
/// ).unwrap();
///
/// let net = RoutingNetwork::new(depot, customers, dm, 2.0);
/// assert_eq!(net.num_customers(), 1);
/// assert!((net.travel_time(0, 1) - 2.5).abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct RoutingNetwork {
    depot: Depot,
    customers: Vec<Customer>,
    distances: DistanceMatrix,
    speed: f64,
}

impl RoutingNetwork {
    /// Creates a network. `distances` must be sized `customers.len() + 1`.
    pub fn new(depot: Depot, customers: Vec<Customer>, distances: DistanceMatrix, speed: f64) -> Self {
        debug_assert_eq!(distances.size(), customers.len() + 1);
        Self {
            depot,
            customers,
            distances,
            speed,
        }
    }

    /// Number of customers (excluding the depot).
    pub fn num_customers(&self) -> usize {
        self.customers.len()
    }

    pub fn depot(&self) -> &Depot {
        &self.depot
    }

    /// Customer at network index `node` (`node >= 1`).
    pub fn customer(&self, node: usize) -> &Customer {
        &self.customers[node - 1]
    }

    /// Network indices of all customers, in input order.
    pub fn customer_nodes(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.customers.len()
    }

    /// Id of the location at `node`.
    pub fn node_id(&self, node: usize) -> &str {
        if node == 0 {
            self.depot.id()
        } else {
            self.customer(node).id()
        }
    }

    pub fn demand(&self, node: usize) -> f64 {
        if node == 0 {
            0.0
        } else {
            self.customer(node).demand()
        }
    }

    pub fn service_duration(&self, node: usize) -> f64 {
        if node == 0 {
            0.0
        } else {
            self.customer(node).service_duration()
        }
    }

    /// Time window of a customer, or the depot's opening hours for node 0.
    pub fn time_window(&self, node: usize) -> Option<&TimeWindow> {
        if node == 0 {
            self.depot.time_window()
        } else {
            self.customer(node).time_window()
        }
    }

    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances.get(from, to)
    }

    pub fn travel_time(&self, from: usize, to: usize) -> f64 {
        self.distances.get(from, to) / self.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMode;
    use crate::models::Point;

    fn network() -> RoutingNetwork {
        let depot = Depot::new("D", Point::new(0.0, 0.0))
            .with_time_window(TimeWindow::new(0.0, 100.0).expect("valid"));
        let customers = vec![
            Customer::new("C1", Point::new(3.0, 4.0), 10.0).with_service_duration(5.0),
            Customer::new("C2", Point::new(6.0, 8.0), 20.0),
        ];
        let pts: Vec<Point> = std::iter::once(depot.location())
            .chain(customers.iter().map(|c| c.location()))
            .collect();
        let dm = DistanceMatrix::from_points(&pts, DistanceMode::Euclidean).expect("computed");
        RoutingNetwork::new(depot, customers, dm, 1.0)
    }

    #[test]
    fn test_depot_is_node_zero() {
        let net = network();
        assert_eq!(net.node_id(0), "D");
        assert_eq!(net.demand(0), 0.0);
        assert_eq!(net.service_duration(0), 0.0);
        assert_eq!(net.time_window(0).expect("depot hours").latest(), 100.0);
    }

    #[test]
    fn test_customer_lookup_is_offset_by_one() {
        let net = network();
        assert_eq!(net.node_id(1), "C1");
        assert_eq!(net.demand(2), 20.0);
        assert_eq!(net.service_duration(1), 5.0);
        assert!(net.time_window(2).is_none());
        assert_eq!(net.customer_nodes().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_distance_and_time() {
        let net = network();
        assert!((net.distance(0, 2) - 10.0).abs() < 1e-10);
        assert!((net.travel_time(1, 2) - 5.0).abs() < 1e-10);
    }
}
