//! Facility plans: which sites are open and who they serve.

use serde::{Deserialize, Serialize};

use crate::models::Point;

/// One facility site in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    pub id: String,
    pub location: Point,
    pub open: bool,
    /// Demand served.
    pub load: f64,
    /// `None` for uncapacitated sites.
    pub capacity: Option<f64>,
    /// Fixed cost charged when open (after any multiplier).
    pub fixed_cost: f64,
}

/// The facility serving a customer; for split deliveries the one with the
/// largest share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAssignment {
    pub customer: String,
    /// `None` when the customer could not be placed.
    pub facility: Option<String>,
    pub demand: f64,
}

/// Quantity shipped from a facility to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub facility: String,
    pub customer: String,
    pub amount: f64,
}

/// Result payload of both facility engines.
///
/// `total_cost` is `fixed_cost + transport_cost + penalty`; the penalty is
/// nonzero only for heuristic plans that left customers unplaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityPlan {
    pub sites: Vec<SiteReport>,
    pub assignments: Vec<CustomerAssignment>,
    pub flows: Vec<Flow>,
    pub fixed_cost: f64,
    pub transport_cost: f64,
    #[serde(default)]
    pub penalty: f64,
    pub total_cost: f64,
}

impl FacilityPlan {
    /// Number of open sites.
    pub fn num_open(&self) -> usize {
        self.sites.iter().filter(|s| s.open).count()
    }

    /// Customers without a facility.
    pub fn unplaced(&self) -> impl Iterator<Item = &CustomerAssignment> {
        self.assignments.iter().filter(|a| a.facility.is_none())
    }

    /// Returns `true` when every customer has a facility.
    pub fn is_complete(&self) -> bool {
        self.unplaced().next().is_none()
    }

    pub fn site(&self, id: &str) -> Option<&SiteReport> {
        self.sites.iter().find(|s| s.id == id)
    }
}
