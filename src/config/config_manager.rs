//! Shared configuration with automatic persistence

use crate::{config::settings::Settings, Result};
use serde_json::{Map, Value};
use tracing::info;

/// Thread-safe configuration manager
///
/// Owns the plugin configuration and the file it is persisted to. Clones
/// share the same underlying state.
///
/// # Example
/// ```rust,no_run
/// use portsync::config::ConfigManager;
/// use serde_json::json;
///
/// # async fn example() -> portsync::Result<()> {
/// let manager = ConfigManager::new("portsync.json").await?;
///
/// let updates = json!({ "poll_interval": 60 });
/// let changed = manager.merge(updates.as_object().unwrap()).await?;
/// println!("Config changed: {}", changed);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// Shared configuration state
    settings: std::sync::Arc<tokio::sync::RwLock<Settings>>,
    /// Path to the config file for auto-save
    config_path: std::sync::Arc<String>,
}

impl ConfigManager {
    /// Create a new config manager
    ///
    /// Loads the configuration from `path`, falling back to defaults when the
    /// file does not exist yet.
    pub async fn new<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let settings = Settings::load(&path)?;

        Ok(Self {
            settings: std::sync::Arc::new(tokio::sync::RwLock::new(settings)),
            config_path: std::sync::Arc::new(path_str),
        })
    }

    /// Path of the backing config file
    pub fn path(&self) -> &str {
        self.config_path.as_str()
    }

    /// Get a snapshot of the whole configuration
    pub async fn get_all(&self) -> Settings {
        let settings = self.settings.read().await;
        settings.clone()
    }

    /// Get the configuration as a flat key-value mapping
    pub async fn to_map(&self) -> Map<String, Value> {
        let settings = self.settings.read().await;
        settings.to_map()
    }

    /// Merge the given keys into the configuration and auto-save
    ///
    /// Nothing is applied or written if any key is rejected.
    ///
    /// # Returns
    /// Whether any value changed
    pub async fn merge(&self, updates: &Map<String, Value>) -> Result<bool> {
        let mut settings = self.settings.write().await;
        let changed = settings.merge(updates)?;
        settings.save(self.config_path.as_str())?;

        if changed {
            info!(
                "Config updated: forwarder {}:{}, poll interval {}s",
                settings.forwarder_host, settings.forwarder_port, settings.poll_interval_seconds
            );
        }

        Ok(changed)
    }

    /// Reload the configuration from disk
    pub async fn reload(&self) -> Result<()> {
        let loaded = Settings::load(self.config_path.as_str())?;
        let mut settings = self.settings.write().await;
        *settings = loaded;
        Ok(())
    }

    /// Save the current configuration to disk
    pub async fn save(&self) -> Result<()> {
        let settings = self.settings.read().await;
        settings.save(self.config_path.as_str())
    }
}
