//! Pushes a new listen port into the host and re-announces sessions

use super::host::HostSystem;
use super::types::{ApplyStep, SyncError};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Applies a forwarded port to the host
///
/// Reconfiguring and re-announcing form one logical step: the first failure
/// aborts the apply and is reported with the step it happened in. Rolling
/// back a partially applied configuration is left to the host.
#[derive(Clone)]
pub struct PortApplier {
    host: Arc<dyn HostSystem>,
}

impl PortApplier {
    /// Create an applier for the given host
    pub fn new(host: Arc<dyn HostSystem>) -> Self {
        Self { host }
    }

    /// Set the host's listen port to `[new_port, new_port]` and re-announce
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Apply` naming the step the host rejected.
    pub async fn apply_port(&self, new_port: u16) -> Result<(), SyncError> {
        if let Err(e) = self.host.set_listen_ports([new_port, new_port]).await {
            error!(
                "Failed to update listen port to {} ({}): {}",
                new_port,
                ApplyStep::Configure,
                e
            );
            return Err(SyncError::Apply {
                step: ApplyStep::Configure,
                reason: e.to_string(),
            });
        }

        let reannounced = match self.host.get_session_state().await {
            Ok(sessions) => {
                debug!("Re-announcing {} sessions", sessions.len());
                self.host.force_reannounce(&sessions).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = reannounced {
            error!(
                "Failed to update listen port to {} ({}): {}",
                new_port,
                ApplyStep::Reannounce,
                e
            );
            return Err(SyncError::Apply {
                step: ApplyStep::Reannounce,
                reason: e.to_string(),
            });
        }

        info!("Updated listen port to: {}", new_port);
        Ok(())
    }
}
