//! # u-netdesign
//!
//! Supply-chain network design engines: exact facility location over
//! candidate sites, continuous facility placement by particle swarm, and
//! capacitated vehicle routing with time windows.
//!
//! ## Modules
//!
//! - [`models`] — Domain types (Point, Customer, CandidateFacility, Vehicle, Depot, Route)
//! - [`distance`] — Distance modes and validated distance matrices
//! - [`evaluation`] — Route timing, load and hard-constraint checks
//! - [`constructive`] — Cheapest-insertion route construction
//! - [`local_search`] — Relocate and segment-exchange moves
//! - [`milp`] — Backend-neutral MILP model, branch-and-bound, optional HiGHS
//! - [`location`] — Facility-MILP and Facility-PSO engines
//! - [`routing`] — VRP engine (construction + improvement)
//! - [`envelope`] — Solution envelope with JSON and CSV round trip
//! - [`solver`] — Validation and dispatch of a problem instance
//!
//! ## Features
//!
//! - `parallel` (default): swarm particles are scored on the rayon pool
//! - `highs`: the HiGHS MILP backend, recommended over the built-in
//!   branch-and-bound for anything beyond small instances
//!
//! ## Quick start
//!
//! ```
//! use u_netdesign::envelope::SolveStatus;
//! use u_netdesign::models::{CandidateFacility, Customer, Point};
//! use u_netdesign::solver::{Problem, ProblemInstance, Solver};
//!
//! let instance = ProblemInstance::new(Problem::FacilityMilp {
//!     facilities: vec![
//!         CandidateFacility::new("F1", Point::new(0.0, 0.0), 10.0, 100.0),
//!         CandidateFacility::new("F2", Point::new(10.0, 0.0), 10.0, 100.0),
//!     ],
//!     customers: vec![
//!         Customer::new("C1", Point::new(1.0, 0.0), 20.0),
//!         Customer::new("C2", Point::new(9.0, 0.0), 20.0),
//!     ],
//! });
//!
//! let envelope = Solver::new().solve(&instance);
//! assert_eq!(envelope.status, SolveStatus::Optimal);
//! assert!(envelope.feasible);
//! ```

pub mod config;
pub mod constructive;
pub mod distance;
pub mod envelope;
pub mod error;
pub mod evaluation;
pub mod local_search;
pub mod location;
pub mod milp;
pub mod models;
pub mod quota;
pub mod routing;
pub mod solver;
pub mod telemetry;
