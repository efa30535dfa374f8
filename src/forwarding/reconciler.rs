//! One reachability check and port update pass
//!
//! A cycle runs strictly in order: probe the current listen port, fetch the
//! forwarded port only if the probe failed, then apply it only if it differs.
//! Every failure is turned into a [`CycleResult::Failed`]; nothing here
//! returns an error to the caller.

use super::applier::PortApplier;
use super::forwarder::ForwarderClient;
use super::host::HostSystem;
use super::types::{CycleReport, CycleResult};
use crate::config::Settings;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where to reach the port-forward API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderTarget {
    /// Forwarder host name or address
    pub host: String,
    /// Forwarder API port
    pub port: u16,
}

impl From<&Settings> for ForwarderTarget {
    fn from(settings: &Settings) -> Self {
        Self {
            host: settings.forwarder_host.clone(),
            port: settings.forwarder_port,
        }
    }
}

/// Runs reconciliation cycles against a host
#[derive(Clone)]
pub struct Reconciler {
    host: Arc<dyn HostSystem>,
    client: ForwarderClient,
    applier: PortApplier,
    target: ForwarderTarget,
}

impl Reconciler {
    /// Create a reconciler for `host`, fetching from `target` with `client`
    pub fn new(host: Arc<dyn HostSystem>, client: ForwarderClient, target: ForwarderTarget) -> Self {
        let applier = PortApplier::new(host.clone());
        Self {
            host,
            client,
            applier,
            target,
        }
    }

    /// Forwarder this reconciler queries
    pub fn target(&self) -> &ForwarderTarget {
        &self.target
    }

    /// Run one cycle and return its outcome
    pub async fn run_cycle(&self) -> CycleResult {
        self.run_cycle_report().await.result
    }

    /// Run one cycle and return its outcome with the observed listen port
    pub async fn run_cycle_report(&self) -> CycleReport {
        let current = self.host.get_listen_port().await;
        debug!("Current listen port: {}", current);

        let result = self.reconcile(current).await;

        CycleReport {
            result,
            listen_port: current,
            finished_at_ms: Utc::now().timestamp_millis(),
        }
    }

    async fn reconcile(&self, current: u16) -> CycleResult {
        let reachable = self.host.test_listen_port(current).await;
        debug!(
            "Listen port {} is {}",
            current,
            if reachable { "not blocked" } else { "blocked" }
        );

        if reachable {
            return CycleResult::Skipped;
        }

        info!("Attempting to update listen port");
        let forwarded = match self
            .client
            .fetch_forwarded_port(&self.target.host, self.target.port)
            .await
        {
            Ok(port) => port,
            Err(e) => {
                error!("Failed to fetch forwarded port: {}", e);
                return CycleResult::Failed(e);
            }
        };

        if forwarded == current {
            warn!("Forwarded port is same as current port: {}", forwarded);
            return CycleResult::NoOp { port: current };
        }

        info!(
            "Attempting to update listen port from {} to {}",
            current, forwarded
        );
        match self.applier.apply_port(forwarded).await {
            Ok(()) => CycleResult::Applied {
                from: current,
                to: forwarded,
            },
            Err(e) => CycleResult::Failed(e),
        }
    }
}
