//! Capabilities the embedding host exposes to the forwarding loop

use async_trait::async_trait;
use thiserror::Error;

/// Error raised by a host capability
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    /// Create a host error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Opaque handle to the sessions the host currently manages
///
/// Obtained from [`HostSystem::get_session_state`] and handed back unchanged to
/// [`HostSystem::force_reannounce`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHandle {
    ids: Vec<String>,
}

impl SessionHandle {
    /// Wrap the host's session identifiers
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    /// Session identifiers
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the host has no sessions
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Narrow capability surface of the host system
///
/// Passed explicitly to the reconciler and applier at construction.
#[async_trait]
pub trait HostSystem: Send + Sync {
    /// Port the host currently listens on
    async fn get_listen_port(&self) -> u16;

    /// Whether `port` is reachable from outside
    async fn test_listen_port(&self, port: u16) -> bool;

    /// Configure the listen port range, both ends inclusive
    async fn set_listen_ports(&self, range: [u16; 2]) -> Result<(), HostError>;

    /// Handle to all currently managed sessions
    async fn get_session_state(&self) -> Result<SessionHandle, HostError>;

    /// Re-announce the given sessions so peers learn the current port
    async fn force_reannounce(&self, sessions: &SessionHandle) -> Result<(), HostError>;
}
