//! Engine payloads carried by the envelope.

use serde::{Deserialize, Serialize};

use crate::location::FacilityPlan;
use crate::models::{RoutingNetwork, RoutingSolution, UnassignedReason, Vehicle};

/// One stop of a reported route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopReport {
    pub customer: String,
    pub arrival: f64,
    pub service_start: f64,
    pub departure: f64,
    /// Cumulative load after the stop.
    pub load_after: f64,
}

/// A vehicle's route; no stops marks an unused vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    pub vehicle: String,
    pub stops: Vec<StopReport>,
    pub distance: f64,
    pub duration: f64,
    pub drive_time: f64,
    pub load: f64,
    pub cost: f64,
}

impl RouteReport {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// A customer the routing engine could not place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedReport {
    pub customer: String,
    pub reason: UnassignedReason,
}

/// Routing payload keyed by ids instead of network indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Exactly one entry per fleet vehicle, in fleet order.
    pub routes: Vec<RouteReport>,
    pub unassigned: Vec<UnassignedReport>,
    pub total_distance: f64,
    pub total_duration: f64,
    pub total_cost: f64,
}

impl RoutePlan {
    /// Reads a solution back into ids.
    pub fn from_solution(network: &RoutingNetwork, vehicles: &[Vehicle], solution: &RoutingSolution) -> Self {
        let routes = solution
            .routes()
            .iter()
            .map(|r| RouteReport {
                vehicle: vehicles[r.vehicle_index()].id().to_string(),
                stops: r
                    .visits()
                    .iter()
                    .map(|v| StopReport {
                        customer: network.node_id(v.node).to_string(),
                        arrival: v.arrival_time,
                        service_start: v.service_start,
                        departure: v.departure_time,
                        load_after: v.load_after,
                    })
                    .collect(),
                distance: r.total_distance(),
                duration: r.total_duration(),
                drive_time: r.drive_time(),
                load: r.total_load(),
                cost: r.cost(),
            })
            .collect();
        let unassigned = solution
            .unassigned()
            .iter()
            .map(|&(node, reason)| UnassignedReport {
                customer: network.node_id(node).to_string(),
                reason,
            })
            .collect();
        Self {
            routes,
            unassigned,
            total_distance: solution.total_distance(),
            total_duration: solution.total_duration(),
            total_cost: solution.total_cost(),
        }
    }

    /// Number of routes with at least one stop.
    pub fn num_used(&self) -> usize {
        self.routes.iter().filter(|r| !r.is_empty()).count()
    }
}

/// The engine-specific part of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Payload {
    Facility(FacilityPlan),
    Routes(RoutePlan),
}

impl Payload {
    /// The payload's own objective value.
    pub fn objective(&self) -> f64 {
        match self {
            Payload::Facility(plan) => plan.total_cost,
            Payload::Routes(plan) => plan.total_cost,
        }
    }

    pub fn as_facility(&self) -> Option<&FacilityPlan> {
        match self {
            Payload::Facility(plan) => Some(plan),
            Payload::Routes(_) => None,
        }
    }

    pub fn as_routes(&self) -> Option<&RoutePlan> {
        match self {
            Payload::Routes(plan) => Some(plan),
            Payload::Facility(_) => None,
        }
    }
}
