//! Common types for the forwarding module

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Step of a port apply that can fail independently
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApplyStep {
    /// Writing the new listen port range into host configuration
    Configure,
    /// Collecting sessions and forcing a re-announce to peers
    Reannounce,
}

impl fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyStep::Configure => write!(f, "configure listen port"),
            ApplyStep::Reannounce => write!(f, "re-announce sessions"),
        }
    }
}

/// Errors that can end a cycle
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncError {
    /// Forwarder could not be reached (refused, unresolvable, timed out)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Forwarder answered with a non-200 status
    #[error("Protocol error: forwarder returned status {status}")]
    Protocol {
        /// HTTP status code received
        status: u16,
    },

    /// Forwarder body was not JSON or had no usable `port`
    #[error("Parse error: {0}")]
    Parse(String),

    /// Host rejected the new port or the re-announce
    #[error("Apply error during {step}: {reason}")]
    Apply {
        /// Step that failed
        step: ApplyStep,
        /// Host-provided reason
        reason: String,
    },
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CycleResult {
    /// Listen port was reachable, nothing fetched
    Skipped,
    /// Forwarder reported the port already in use
    NoOp {
        /// The unchanged listen port
        port: u16,
    },
    /// Listen port moved to the forwarded port
    Applied {
        /// Listen port before the cycle
        from: u16,
        /// Listen port after the cycle
        to: u16,
    },
    /// Cycle ended early on an error
    Failed(SyncError),
}

impl CycleResult {
    /// Check if the cycle ended on an error
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleResult::Failed(_))
    }

    /// Short description for logs and status output
    pub fn summary(&self) -> String {
        match self {
            CycleResult::Skipped => "skipped: listen port reachable".to_string(),
            CycleResult::NoOp { port } => format!("no-op: port {} unchanged", port),
            CycleResult::Applied { from, to } => format!("applied: {} → {}", from, to),
            CycleResult::Failed(e) => format!("failed: {}", e),
        }
    }
}

/// A finished cycle, kept in memory for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleReport {
    /// How the cycle ended
    pub result: CycleResult,
    /// Listen port observed at cycle start
    pub listen_port: u16,
    /// Timestamp when the cycle finished (Unix milliseconds)
    pub finished_at_ms: i64,
}
