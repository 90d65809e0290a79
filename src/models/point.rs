//! Planar coordinates.

use serde::{Deserialize, Serialize};

/// A 2D coordinate, immutable once loaded.
///
/// For the haversine distance mode `x` is read as longitude and `y` as
/// latitude, both in degrees.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::Point;
///
/// let p = Point::new(3.0, 4.0);
/// assert!(p.is_finite());
/// assert!((p.euclidean(&Point::new(0.0, 0.0)) - 5.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate (longitude for haversine).
    pub x: f64,
    /// Vertical coordinate (latitude for haversine).
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if neither coordinate is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Straight-line distance.
    pub fn euclidean(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// City-block distance.
    pub fn manhattan(&self, other: &Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Great-circle distance in kilometres.
    pub fn haversine(&self, other: &Point) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lat2) = (self.y.to_radians(), other.y.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.x - self.x).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}
