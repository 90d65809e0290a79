//! Distance modes and validated matrix construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SolveError;
use crate::models::Point;

use super::DistanceMatrix;

/// Relative tolerance when comparing the two directions of a precomputed pair.
const SYMMETRY_TOL: f64 = 1e-6;

/// How distances between points are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMode {
    /// Straight-line distance.
    #[default]
    Euclidean,
    /// City-block distance.
    Manhattan,
    /// Great-circle kilometres on (longitude, latitude) degrees.
    Haversine,
    /// Supplied by the caller as [`DistanceEntry`] rows.
    Precomputed,
}

impl DistanceMode {
    /// Distance between two points, or `None` for the precomputed mode.
    pub fn between(&self, a: &Point, b: &Point) -> Option<f64> {
        match self {
            Self::Euclidean => Some(a.euclidean(b)),
            Self::Manhattan => Some(a.manhattan(b)),
            Self::Haversine => Some(a.haversine(b)),
            Self::Precomputed => None,
        }
    }

    /// Returns `true` if the mode derives distances from coordinates.
    pub fn is_geometric(&self) -> bool {
        !matches!(self, Self::Precomputed)
    }

    /// The distance function of a geometric mode.
    pub fn metric(&self) -> Option<fn(&Point, &Point) -> f64> {
        match self {
            Self::Euclidean => Some(Point::euclidean),
            Self::Manhattan => Some(Point::manhattan),
            Self::Haversine => Some(Point::haversine),
            Self::Precomputed => None,
        }
    }
}

/// One row of a caller-supplied distance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceEntry {
    pub from: String,
    pub to: String,
    pub value: f64,
}

impl DistanceEntry {
    pub fn new(from: impl Into<String>, to: impl Into<String>, value: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value,
        }
    }
}

/// Builds a complete, validated distance matrix over `ids`/`points` (same
/// order, same length).
///
/// Geometric modes fail only on unusable coordinates
/// ([`SolveError::InvalidInput`]). The precomputed mode reads `entries` and
/// fails with [`SolveError::MalformedMatrix`] when a pair is missing,
/// negative, non-finite, contradictory or asymmetric. Entries naming ids
/// outside `ids` are ignored.
///
/// # Examples
///
/// ```
/// use u_netdesign::distance::{build_matrix, DistanceEntry, DistanceMode};
/// use u_netdesign::models::Point;
///
/// let ids = ["A", "B"];
/// let points = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
/// let entries = vec![DistanceEntry::new("A", "B", 7.5)];
/// let dm = build_matrix(&ids, &points, DistanceMode::Precomputed, Some(&entries)).unwrap();
/// assert_eq!(dm.get(1, 0), 7.5);
/// ```
pub fn build_matrix(
    ids: &[&str],
    points: &[Point],
    mode: DistanceMode,
    entries: Option<&[DistanceEntry]>,
) -> Result<DistanceMatrix, SolveError> {
    if ids.len() != points.len() {
        return Err(SolveError::invalid(format!(
            "{} ids but {} points",
            ids.len(),
            points.len()
        )));
    }

    match mode {
        DistanceMode::Precomputed => {
            let entries = entries.ok_or_else(|| {
                SolveError::malformed("precomputed distance mode without distance entries")
            })?;
            from_entries(ids, entries)
        }
        _ => {
            check_points(ids, points, mode)?;
            DistanceMatrix::from_points(points, mode)
                .ok_or_else(|| SolveError::failure("geometric mode produced no distances"))
        }
    }
}

/// Rejects coordinates the geometric formulas cannot use.
pub(crate) fn check_points(ids: &[&str], points: &[Point], mode: DistanceMode) -> Result<(), SolveError> {
    for (id, p) in ids.iter().zip(points) {
        if !p.is_finite() {
            return Err(SolveError::invalid(format!("point '{id}' has non-finite coordinates")));
        }
        if mode == DistanceMode::Haversine && !(-90.0..=90.0).contains(&p.y) {
            return Err(SolveError::invalid(format!(
                "point '{id}' latitude {} outside [-90, 90]",
                p.y
            )));
        }
    }
    Ok(())
}

fn from_entries(ids: &[&str], entries: &[DistanceEntry]) -> Result<DistanceMatrix, SolveError> {
    let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let n = ids.len();
    let mut given: Vec<Option<f64>> = vec![None; n * n];

    for e in entries {
        let (Some(&i), Some(&j)) = (index.get(e.from.as_str()), index.get(e.to.as_str())) else {
            continue;
        };
        if !e.value.is_finite() || e.value < 0.0 {
            return Err(SolveError::malformed(format!(
                "distance ({}, {}) = {} must be finite and non-negative",
                e.from, e.to, e.value
            )));
        }
        let slot = &mut given[i * n + j];
        if let Some(prev) = *slot {
            if !close(prev, e.value) {
                return Err(SolveError::malformed(format!(
                    "pair ({}, {}) given twice with {} and {}",
                    e.from, e.to, prev, e.value
                )));
            }
        }
        *slot = Some(e.value);
    }

    let mut dm = DistanceMatrix::new(n);
    for i in 0..n {
        if let Some(d) = given[i * n + i] {
            if !close(d, 0.0) {
                return Err(SolveError::malformed(format!(
                    "self distance of '{}' is {d}, expected 0",
                    ids[i]
                )));
            }
        }
        for j in (i + 1)..n {
            let d = match (given[i * n + j], given[j * n + i]) {
                (Some(a), Some(b)) if !close(a, b) => {
                    return Err(SolveError::malformed(format!(
                        "asymmetric pair ({}, {}): {a} vs {b}",
                        ids[i], ids[j]
                    )));
                }
                (Some(a), _) | (None, Some(a)) => a,
                (None, None) => {
                    return Err(SolveError::malformed(format!(
                        "missing pair ({}, {})",
                        ids[i], ids[j]
                    )));
                }
            };
            dm.set(i, j, d);
            dm.set(j, i, d);
        }
    }
    Ok(dm)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= SYMMETRY_TOL * a.abs().max(b.abs()).max(1.0)
}
