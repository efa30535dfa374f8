//! Forwarded port synchronisation
//!
//! This module keeps the host's listen port aligned with the port the VPN
//! gateway forwards:
//! - `scheduler` - runs a cycle immediately and then on a fixed interval
//! - `reconciler` - one cycle: probe, fetch if blocked, apply if different
//! - `forwarder` - HTTP client for the gateway's port-forward API
//! - `applier` - reconfigures the host and re-announces its sessions
//! - `host` - the capability surface the host provides

// Submodules
pub mod applier;
pub mod forwarder;
pub mod host;
pub mod reconciler;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use types::{ApplyStep, CycleReport, CycleResult, SyncError};

// Re-export main components
pub use applier::PortApplier;
pub use forwarder::{forward_url, parse_forwarded_port, ForwarderClient};
pub use host::{HostError, HostSystem, SessionHandle};
pub use reconciler::{ForwarderTarget, Reconciler};
pub use scheduler::Scheduler;
