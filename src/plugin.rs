//! Plugin lifecycle and management surface
//!
//! The host creates one [`PortSyncPlugin`], enables it to start polling and
//! disables it on shutdown. Configuration is read and changed through
//! [`PortSyncPlugin::get_config`] and [`PortSyncPlugin::set_config`]; a change
//! restarts the scheduler with a reconciler built from the new values.

use crate::config::{ConfigManager, Settings};
use crate::forwarding::{
    CycleReport, CycleResult, ForwarderClient, ForwarderTarget, HostSystem, Reconciler, Scheduler,
};
use crate::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Forwarded-port plugin embedded in a host
///
/// Clones share the same scheduler, configuration and status.
///
/// # Example
/// ```rust,no_run
/// use portsync::forwarding::HostSystem;
/// use portsync::PortSyncPlugin;
/// use std::sync::Arc;
///
/// # async fn example(host: Arc<dyn HostSystem>) -> portsync::Result<()> {
/// let plugin = PortSyncPlugin::new(host, "portsync.json").await?;
/// plugin.enable().await;
///
/// let updates = serde_json::json!({ "poll_interval": 60 });
/// plugin.set_config(updates.as_object().unwrap()).await?;
///
/// plugin.disable().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PortSyncPlugin {
    host: Arc<dyn HostSystem>,
    config: ConfigManager,
    client: ForwarderClient,
    /// Also serializes lifecycle and management calls
    scheduler: Arc<Mutex<Scheduler>>,
    last_cycle: Arc<Mutex<Option<CycleReport>>>,
}

impl PortSyncPlugin {
    /// Create a disabled plugin, loading configuration from `config_path`
    pub async fn new<P: AsRef<std::path::Path>>(
        host: Arc<dyn HostSystem>,
        config_path: P,
    ) -> Result<Self> {
        let config = ConfigManager::new(config_path).await?;

        Ok(Self {
            host,
            config,
            client: ForwarderClient::new(),
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            last_cycle: Arc::new(Mutex::new(None)),
        })
    }

    /// Use a custom forwarder client (e.g. a shorter request timeout)
    pub fn with_client(mut self, client: ForwarderClient) -> Self {
        self.client = client;
        self
    }

    /// Start polling with the current configuration
    pub async fn enable(&self) {
        let mut scheduler = self.scheduler.lock().await;
        let settings = self.config.get_all().await;
        info!(
            "Enabling port sync (forwarder {}:{}, every {}s)",
            settings.forwarder_host, settings.forwarder_port, settings.poll_interval_seconds
        );
        self.start_scheduler(&mut scheduler, &settings);
    }

    /// Stop polling; a cycle already running is left to finish
    pub async fn disable(&self) {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_running() {
            info!("Disabling port sync");
        }
        scheduler.stop();
    }

    /// Check if the plugin is polling
    pub async fn is_enabled(&self) -> bool {
        self.scheduler.lock().await.is_running()
    }

    /// Interval the scheduler is running at, if enabled
    pub async fn poll_interval(&self) -> Option<std::time::Duration> {
        self.scheduler.lock().await.interval()
    }

    /// Merge `updates` into the configuration and persist it
    ///
    /// If any value changed and the plugin is enabled, the scheduler is
    /// restarted with the new values.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for unknown keys or invalid values, in which
    /// case nothing is changed, or `Error::Storage` if persisting fails.
    pub async fn set_config(&self, updates: &Map<String, Value>) -> Result<()> {
        let mut scheduler = self.scheduler.lock().await;
        let changed = self.config.merge(updates).await?;

        if !changed {
            debug!("Config unchanged, scheduler left as is");
            return Ok(());
        }

        if scheduler.is_running() {
            let settings = self.config.get_all().await;
            info!("Config changed, restarting scheduler");
            self.start_scheduler(&mut scheduler, &settings);
        }

        Ok(())
    }

    /// Current configuration as a flat key-value mapping
    pub async fn get_config(&self) -> Map<String, Value> {
        self.config.to_map().await
    }

    /// Current configuration as a typed value
    pub async fn settings(&self) -> Settings {
        self.config.get_all().await
    }

    /// Outcome of the most recent finished cycle
    pub async fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle.lock().await.clone()
    }

    fn start_scheduler(&self, scheduler: &mut Scheduler, settings: &Settings) {
        let reconciler = Reconciler::new(
            self.host.clone(),
            self.client.clone(),
            ForwarderTarget::from(settings),
        );
        let last_cycle = self.last_cycle.clone();

        scheduler.start(settings.poll_interval(), move || {
            let reconciler = reconciler.clone();
            let last_cycle = last_cycle.clone();
            async move {
                let report = reconciler.run_cycle_report().await;
                if !matches!(report.result, CycleResult::Skipped) {
                    debug!("Cycle finished: {}", report.result.summary());
                }
                *last_cycle.lock().await = Some(report);
            }
        });
    }
}
