//! Typed crawl errors. Per-item failures are logged and swallowed; only these
//! pool-wide conditions terminate the engine, and callers tell them apart by
//! downcasting the `anyhow::Error` the coordinator returns.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrawlError {
    /// The configured item cap was reached; the pool shuts down gracefully.
    #[error("request limit exceeded, count: {count}")]
    LimitExceeded { count: u32 },

    /// Cooperative cancellation: watchdog idle, deadline, Ctrl+C, or limit.
    #[error("crawl cancelled: {reason}")]
    Cancelled { reason: CancelReason },

    /// Malformed field name in a store query. Surfaced synchronously to the
    /// query caller, never retried.
    #[error("invalid field name \"{name}\"")]
    InvalidField { name: String },
}

/// Why the cancel token was tripped. `Idle` is the clean-completion case:
/// both frontier channels stayed empty for the configured window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Idle,
    Deadline,
    Interrupt,
    Limit,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Idle => write!(f, "frontier idle timeout"),
            CancelReason::Deadline => write!(f, "operation deadline"),
            CancelReason::Interrupt => write!(f, "interrupted"),
            CancelReason::Limit => write!(f, "item limit"),
        }
    }
}
