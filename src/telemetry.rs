//! Injected logging.

use std::sync::Arc;

/// A logger which is called with progress information from the engines.
///
/// There is no process-wide logger: each solve call carries its own through
/// [`SolveContext`](crate::quota::SolveContext).
pub type InfoLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Returns a logger which discards every message.
pub fn silent_logger() -> InfoLogger {
    Arc::new(|_: &str| {})
}

/// Returns a logger which writes every message to stderr.
pub fn stderr_logger() -> InfoLogger {
    Arc::new(|msg: &str| eprintln!("{msg}"))
}
