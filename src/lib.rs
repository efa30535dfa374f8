//! Portsync - forwarded port synchronisation for hosts behind a VPN gateway
//!
//! This library periodically checks whether the host's listen port is reachable
//! from outside. When it is not, it asks the gateway's port-forwarding API for
//! the currently forwarded port and reconfigures the host to listen on it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod control;
pub mod forwarding;
pub mod plugin;

#[cfg(test)]
mod tests;

pub use plugin::PortSyncPlugin;

/// Result type alias for Portsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Portsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration key or value
    #[error("Config error: {0}")]
    Config(String),

    /// Configuration persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Control server error
    #[error("Control error: {0}")]
    Control(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// HTTP/Hyper error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

/// Initialize logging for a host binary embedding Portsync
pub fn init() {
    tracing_subscriber::fmt::init();
}
