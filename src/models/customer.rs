//! Demand nodes, depots and time windows.

use serde::{Deserialize, Serialize};

use super::Point;

/// An interval during which service must start.
///
/// The vehicle must arrive no later than `latest` and may arrive before
/// `earliest`, in which case it waits.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::TimeWindow;
///
/// let tw = TimeWindow::new(100.0, 200.0).unwrap();
/// assert!(tw.contains(150.0));
/// assert!(!tw.contains(250.0));
/// assert_eq!(tw.waiting_time(90.0), 10.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    earliest: f64,
    latest: f64,
}

impl TimeWindow {
    /// Creates a time window.
    ///
    /// Returns `None` if `earliest > latest` or either bound is non-finite.
    pub fn new(earliest: f64, latest: f64) -> Option<Self> {
        let tw = Self { earliest, latest };
        tw.is_well_formed().then_some(tw)
    }

    /// Earliest service start.
    pub fn earliest(&self) -> f64 {
        self.earliest
    }

    /// Latest allowable arrival.
    pub fn latest(&self) -> f64 {
        self.latest
    }

    /// Both bounds finite and ordered. Deserialized windows skip the check in
    /// [`TimeWindow::new`], so validation calls this.
    pub fn is_well_formed(&self) -> bool {
        self.earliest.is_finite() && self.latest.is_finite() && self.earliest <= self.latest
    }

    /// Returns `true` if `time` falls within the window.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.earliest && time <= self.latest
    }

    /// Waiting time when arriving at `arrival`; zero once the window is open.
    pub fn waiting_time(&self, arrival: f64) -> f64 {
        (self.earliest - arrival).max(0.0)
    }

    /// Returns `true` if arriving at `arrival` misses the window.
    pub fn is_violated(&self, arrival: f64) -> bool {
        arrival > self.latest + super::TIME_EPS
    }
}

/// A customer with a demand to be served.
///
/// # Examples
///
/// ```
/// use u_netdesign::models::{Customer, Point, TimeWindow};
///
/// let c = Customer::new("C1", Point::new(41.0, 49.0), 10.0)
///     .with_service_duration(5.0)
///     .with_time_window(TimeWindow::new(0.0, 120.0).unwrap());
/// assert_eq!(c.id(), "C1");
/// assert_eq!(c.demand(), 10.0);
/// assert!(c.time_window().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    id: String,
    location: Point,
    #[serde(default)]
    demand: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_window: Option<TimeWindow>,
    #[serde(default)]
    service_duration: f64,
}

impl Customer {
    /// Creates a customer without a time window or service duration.
    pub fn new(id: impl Into<String>, location: Point, demand: f64) -> Self {
        Self {
            id: id.into(),
            location,
            demand,
            time_window: None,
            service_duration: 0.0,
        }
    }

    /// Sets the time window.
    pub fn with_time_window(mut self, tw: TimeWindow) -> Self {
        self.time_window = Some(tw);
        self
    }

    /// Sets the service duration.
    pub fn with_service_duration(mut self, duration: f64) -> Self {
        self.service_duration = duration;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Point {
        self.location
    }

    /// Quantity to deliver.
    pub fn demand(&self) -> f64 {
        self.demand
    }

    pub fn time_window(&self) -> Option<&TimeWindow> {
        self.time_window.as_ref()
    }

    /// Time spent at the customer once service starts.
    pub fn service_duration(&self) -> f64 {
        self.service_duration
    }
}

/// The start and end point of every vehicle route.
///
/// The depot's time window, if any, bounds the whole working day: routes
/// leave at `earliest` and must be back by `latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Depot {
    id: String,
    location: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_window: Option<TimeWindow>,
}

impl Depot {
    /// Creates a depot open all day.
    pub fn new(id: impl Into<String>, location: Point) -> Self {
        Self {
            id: id.into(),
            location,
            time_window: None,
        }
    }

    /// Sets the opening hours.
    pub fn with_time_window(mut self, tw: TimeWindow) -> Self {
        self.time_window = Some(tw);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Point {
        self.location
    }

    pub fn time_window(&self) -> Option<&TimeWindow> {
        self.time_window.as_ref()
    }

    /// Departure time of every route.
    pub fn open_time(&self) -> f64 {
        self.time_window.map_or(0.0, |tw| tw.earliest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_valid() {
        let tw = TimeWindow::new(10.0, 20.0).expect("valid");
        assert_eq!(tw.earliest(), 10.0);
        assert_eq!(tw.latest(), 20.0);
    }

    #[test]
    fn test_time_window_invalid() {
        assert!(TimeWindow::new(20.0, 10.0).is_none());
        assert!(TimeWindow::new(f64::NAN, 10.0).is_none());
        assert!(TimeWindow::new(10.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_time_window_degenerate_point() {
        let tw = TimeWindow::new(5.0, 5.0).expect("valid");
        assert!(tw.contains(5.0));
        assert!(!tw.is_violated(5.0));
        assert!(tw.is_violated(5.1));
    }

    #[test]
    fn test_time_window_waiting() {
        let tw = TimeWindow::new(10.0, 20.0).expect("valid");
        assert!((tw.waiting_time(5.0) - 5.0).abs() < 1e-10);
        assert!(tw.waiting_time(10.0).abs() < 1e-10);
        assert!(tw.waiting_time(15.0).abs() < 1e-10);
    }

    #[test]
    fn test_deserialized_window_checked_by_is_well_formed() {
        let tw: TimeWindow =
            serde_json::from_str(r#"{"earliest": 30.0, "latest": 10.0}"#).expect("parse");
        assert!(!tw.is_well_formed());
    }

    #[test]
    fn test_customer_defaults() {
        let c = Customer::new("A", Point::new(1.0, 2.0), 4.0);
        assert_eq!(c.id(), "A");
        assert_eq!(c.location(), Point::new(1.0, 2.0));
        assert_eq!(c.service_duration(), 0.0);
        assert!(c.time_window().is_none());
    }

    #[test]
    fn test_customer_json_optional_fields() {
        let c: Customer =
            serde_json::from_str(r#"{"id": "C9", "location": {"x": 1.0, "y": 1.0}}"#)
                .expect("parse");
        assert_eq!(c.demand(), 0.0);
        assert!(c.time_window().is_none());
    }

    #[test]
    fn test_depot_open_time() {
        let d = Depot::new("D", Point::new(0.0, 0.0));
        assert_eq!(d.open_time(), 0.0);
        let d = d.with_time_window(TimeWindow::new(480.0, 1080.0).expect("valid"));
        assert_eq!(d.open_time(), 480.0);
    }
}
