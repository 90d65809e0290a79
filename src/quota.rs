//! Computational quotas and the per-call solve context.
//!
//! Every engine checks its quota at least once per iteration (or per
//! branch-and-bound node) and, once it is reached, returns the best solution
//! found so far instead of failing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::telemetry::{silent_logger, InfoLogger};

/// Specifies a computational quota for a solve.
///
/// The main purpose is to allow an engine to stop in reaction to external
/// events such as a wall-clock deadline or user cancellation.
pub trait Quota: Send + Sync {
    /// Returns true when computation should be stopped.
    fn is_reached(&self) -> bool;

    /// Time left before the quota is reached, if it is time based.
    fn remaining(&self) -> Option<Duration> {
        None
    }
}

/// A quota which is never reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl Quota for Unlimited {
    fn is_reached(&self) -> bool {
        false
    }
}

/// A wall-clock deadline, optionally combined with a cancellation flag.
///
/// # Examples
///
/// ```
/// use u_netdesign::quota::{Quota, TimeQuota};
///
/// let quota = TimeQuota::new(60.0);
/// assert!(!quota.is_reached());
/// assert!(quota.remaining().expect("time based").as_secs_f64() <= 60.0);
/// ```
#[derive(Debug, Clone)]
pub struct TimeQuota {
    start: Instant,
    limit: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl TimeQuota {
    /// Creates a deadline `limit_secs` seconds from now.
    ///
    /// Non-finite or negative limits are treated as zero; limits too large
    /// for a [`Duration`] never expire.
    pub fn new(limit_secs: f64) -> Self {
        let secs = if limit_secs.is_finite() && limit_secs > 0.0 {
            limit_secs
        } else {
            0.0
        };
        Self {
            start: Instant::now(),
            limit: Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX),
            cancel: None,
        }
    }

    /// Also stops when `flag` is raised.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Time elapsed since the quota was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Quota for TimeQuota {
    fn is_reached(&self) -> bool {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        self.start.elapsed() >= self.limit
    }

    fn remaining(&self) -> Option<Duration> {
        Some(self.limit.saturating_sub(self.start.elapsed()))
    }
}

/// Everything an engine needs besides the problem data: the quota to honour
/// and the logger to report progress to.
///
/// A context lives for exactly one solve call. Nothing in it is shared with
/// other calls unless the caller shares it on purpose (a cancellation flag).
#[derive(Clone)]
pub struct SolveContext {
    quota: Arc<dyn Quota>,
    logger: InfoLogger,
}

impl SolveContext {
    /// Creates a context from a quota and a logger.
    pub fn new(quota: Arc<dyn Quota>, logger: InfoLogger) -> Self {
        Self { quota, logger }
    }

    /// A context without any limit and a silent logger.
    pub fn unbounded() -> Self {
        Self::new(Arc::new(Unlimited), silent_logger())
    }

    /// Returns true when the engine should stop and report its best solution.
    pub fn is_stopped(&self) -> bool {
        self.quota.is_reached()
    }

    /// Time left before the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.quota.remaining()
    }

    /// The underlying quota.
    pub fn quota(&self) -> &dyn Quota {
        self.quota.as_ref()
    }

    /// Sends a message to the injected logger.
    pub fn log(&self, msg: &str) {
        (self.logger)(msg);
    }
}

impl std::fmt::Debug for SolveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolveContext")
            .field("remaining", &self.quota.remaining())
            .finish_non_exhaustive()
    }
}
