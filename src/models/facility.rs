//! Candidate facility sites.

use serde::{Deserialize, Serialize};

use super::Point;

/// A site where a facility may be opened.
///
/// Only the exact (MILP) location engine works with candidate sites; the
/// swarm engine places its facilities freely.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::{CandidateFacility, Point};
///
/// let f = CandidateFacility::new("F1", Point::new(0.0, 0.0), 500.0, 100.0);
/// assert_eq!(f.fixed_cost(), 500.0);
/// assert_eq!(f.capacity(), 100.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFacility {
    id: String,
    location: Point,
    fixed_cost: f64,
    capacity: f64,
}

impl CandidateFacility {
    /// Creates a candidate site.
    pub fn new(id: impl Into<String>, location: Point, fixed_cost: f64, capacity: f64) -> Self {
        Self {
            id: id.into(),
            location,
            fixed_cost,
            capacity,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Point {
        self.location
    }

    /// Cost paid once if the facility is opened.
    pub fn fixed_cost(&self) -> f64 {
        self.fixed_cost
    }

    /// Maximum total demand the facility can serve.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
