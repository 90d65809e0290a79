//! The common result envelope returned by every solve.
//!
//! An envelope always exists, even for failed solves: errors become a typed
//! [`SolveStatus`] plus diagnostic strings. Envelopes round-trip through JSON
//! ([`SolutionEnvelope::to_json`]) and through a sectioned CSV table
//! ([`SolutionEnvelope::to_csv_string`]) without losing any field.

mod payload;
mod table;

pub use payload::{Payload, RoutePlan, RouteReport, StopReport, UnassignedReport};

use serde::{Deserialize, Serialize};

use crate::error::SolveError;
use crate::routing::MoveCount;

/// Which engine produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    FacilityMilp,
    FacilityPso,
    Vrp,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FacilityMilp => "facility-milp",
            Self::FacilityPso => "facility-pso",
            Self::Vrp => "vrp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::FacilityMilp, Self::FacilityPso, Self::Vrp]
            .into_iter()
            .find(|e| e.as_str() == s)
    }

    /// Heuristic engines may be retried with another seed.
    pub fn is_heuristic(&self) -> bool {
        matches!(self, Self::FacilityPso)
    }
}

/// Terminal status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    Optimal,
    FeasibleNonOptimal,
    Infeasible,
    TimeLimitReached,
    InvalidInput,
    MalformedMatrix,
    SolverFailure,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::FeasibleNonOptimal => "feasible-non-optimal",
            Self::Infeasible => "infeasible",
            Self::TimeLimitReached => "time-limit-reached",
            Self::InvalidInput => "invalid-input",
            Self::MalformedMatrix => "malformed-matrix",
            Self::SolverFailure => "solver-failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Optimal,
            Self::FeasibleNonOptimal,
            Self::Infeasible,
            Self::TimeLimitReached,
            Self::InvalidInput,
            Self::MalformedMatrix,
            Self::SolverFailure,
        ]
        .into_iter()
        .find(|st| st.as_str() == s)
    }

    /// Returns `true` for statuses that stem from a [`SolveError`].
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput | Self::MalformedMatrix | Self::SolverFailure
        )
    }
}

impl From<&SolveError> for SolveStatus {
    fn from(err: &SolveError) -> Self {
        match err {
            SolveError::InvalidInput(_) => Self::InvalidInput,
            SolveError::MalformedMatrix(_) => Self::MalformedMatrix,
            SolveError::Infeasible(_) => Self::Infeasible,
            SolveError::SolverFailure(_) => Self::SolverFailure,
        }
    }
}

/// Run statistics. Fields an engine does not produce stay at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveStats {
    pub elapsed_ms: u64,
    /// PSO generations or VRP improvement iterations.
    pub iterations: u64,
    /// Branch-and-bound nodes.
    pub nodes: u64,
    /// Engine-specific termination reason.
    pub termination: Option<String>,
    /// Seed of the run that produced the payload.
    pub seed: Option<u64>,
    /// Engine runs, including heuristic retries.
    pub attempts: u32,
    pub best_bound: Option<f64>,
    pub gap: Option<f64>,
    /// MILP backend name.
    pub backend: Option<String>,
    /// VRP cost before improvement.
    pub initial_cost: Option<f64>,
    /// PSO global best per generation.
    pub history: Vec<f64>,
    /// VRP applied moves per neighborhood.
    pub moves: Vec<MoveCount>,
}

/// Envelope I/O failure.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("table format: {0}")]
    Format(String),
}

/// Result of one solve.
///
/// # Examples
///
/// ```
/// use u_netdesign::envelope::{EngineKind, SolutionEnvelope, SolveStatus};
/// use u_netdesign::error::SolveError;
///
/// let env = SolutionEnvelope::from_error(
///     EngineKind::Vrp,
///     &SolveError::invalid("duplicate customer id 'C1'"),
/// );
/// assert_eq!(env.status, SolveStatus::InvalidInput);
/// assert!(!env.feasible);
///
/// let text = env.to_csv_string().unwrap();
/// assert_eq!(SolutionEnvelope::from_csv_str(&text).unwrap(), env);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionEnvelope {
    pub engine: EngineKind,
    pub status: SolveStatus,
    /// `true` when the payload satisfies every hard constraint and places
    /// every customer.
    pub feasible: bool,
    /// Objective of the payload, when there is one.
    pub objective: Option<f64>,
    pub payload: Option<Payload>,
    #[serde(default)]
    pub stats: SolveStats,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl SolutionEnvelope {
    /// An envelope without payload.
    pub fn new(engine: EngineKind, status: SolveStatus) -> Self {
        Self {
            engine,
            status,
            feasible: false,
            objective: None,
            payload: None,
            stats: SolveStats::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Envelope for a failed solve; the error text becomes the first
    /// diagnostic.
    pub fn from_error(engine: EngineKind, err: &SolveError) -> Self {
        Self::new(engine, SolveStatus::from(err)).with_diagnostic(err.to_string())
    }

    /// Sets the payload and takes its objective.
    pub fn with_payload(mut self, payload: Payload, feasible: bool) -> Self {
        self.objective = Some(payload.objective());
        self.payload = Some(payload);
        self.feasible = feasible;
        self
    }

    pub fn with_stats(mut self, stats: SolveStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_diagnostic(mut self, message: impl Into<String>) -> Self {
        self.diagnostics.push(message.into());
        self
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Writes the sectioned CSV table.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), EnvelopeError> {
        table::write(self, writer)
    }

    /// Reads an envelope back from its sectioned CSV table.
    pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Self, EnvelopeError> {
        table::read(reader)
    }

    pub fn to_csv_string(&self) -> Result<String, EnvelopeError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| EnvelopeError::Format(e.to_string()))
    }

    pub fn from_csv_str(text: &str) -> Result<Self, EnvelopeError> {
        Self::read_csv(text.as_bytes())
    }
}
