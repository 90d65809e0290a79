//! Vehicle type with capacity, cost and route limits.

use serde::{Deserialize, Serialize};

fn one() -> f64 {
    1.0
}

/// A vehicle that services one route.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::Vehicle;
///
/// let v = Vehicle::new("V1", 200.0).with_max_duration(480.0);
/// assert_eq!(v.id(), "V1");
/// assert_eq!(v.capacity(), 200.0);
/// assert_eq!(v.max_duration(), Some(480.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    id: String,
    capacity: f64,
    #[serde(default = "one")]
    cost_per_distance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_drive_time: Option<f64>,
}

impl Vehicle {
    /// Creates a vehicle with the given capacity.
    ///
    /// Default: cost_per_distance = 1.0, no duration or drive-time limit.
    pub fn new(id: impl Into<String>, capacity: f64) -> Self {
        Self {
            id: id.into(),
            capacity,
            cost_per_distance: 1.0,
            max_duration: None,
            max_drive_time: None,
        }
    }

    /// Sets cost per unit distance.
    pub fn with_cost_per_distance(mut self, cost: f64) -> Self {
        self.cost_per_distance = cost;
        self
    }

    /// Sets the maximum elapsed route time (driving, waiting and service).
    pub fn with_max_duration(mut self, max: f64) -> Self {
        self.max_duration = Some(max);
        self
    }

    /// Sets the maximum driving time (travel only).
    pub fn with_max_drive_time(mut self, max: f64) -> Self {
        self.max_drive_time = Some(max);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Maximum load.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn cost_per_distance(&self) -> f64 {
        self.cost_per_distance
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.max_duration
    }

    pub fn max_drive_time(&self) -> Option<f64> {
        self.max_drive_time
    }
}
