//! Distance/cost provider.
//!
//! Computes distances from coordinates (euclidean, manhattan, haversine) or
//! validates a caller-supplied table, always producing a complete dense
//! matrix indexed in the caller's point order.

mod matrix;
mod provider;

pub use matrix::DistanceMatrix;
pub(crate) use provider::check_points;
pub use provider::{build_matrix, DistanceEntry, DistanceMode};
