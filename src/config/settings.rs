//! Plugin configuration and its on-disk representation

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Persisted key for the forwarder host
pub const KEY_FORWARDER_HOST: &str = "gluetun_host";
/// Persisted key for the forwarder API port
pub const KEY_FORWARDER_PORT: &str = "gluetun_port";
/// Persisted key for the poll interval in seconds
pub const KEY_POLL_INTERVAL: &str = "poll_interval";

/// Default forwarder host
pub const DEFAULT_FORWARDER_HOST: &str = "localhost";
/// Default forwarder API port
pub const DEFAULT_FORWARDER_PORT: u16 = 8000;
/// Default poll interval (5 minutes)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Plugin configuration
///
/// Stored as a flat JSON document using the `gluetun_*` / `poll_interval`
/// key names. Every value is validated when read, whether it comes from disk
/// or from a management call.
///
/// # Example
/// ```rust,no_run
/// use portsync::config::Settings;
///
/// let settings = Settings::load("portsync.json").expect("Failed to load");
/// println!("Forwarder: {}:{}", settings.forwarder_host, settings.forwarder_port);
/// println!("Polling every {}s", settings.poll_interval_seconds);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Host running the port-forwarding API
    #[serde(rename = "gluetun_host")]
    pub forwarder_host: String,
    /// Port of the port-forwarding API
    #[serde(rename = "gluetun_port")]
    pub forwarder_port: u16,
    /// Seconds between reachability checks, always > 0
    #[serde(rename = "poll_interval")]
    pub poll_interval_seconds: u64,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// A missing or empty file yields the defaults. Values that fail
    /// validation fall back to their default individually, so one bad key
    /// does not discard the rest of the file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be read or is not a JSON object.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read config: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_str(&data)
            .map_err(|e| Error::Storage(format!("Failed to parse config: {}", e)))?;

        let Value::Object(map) = value else {
            return Err(Error::Storage(
                "Failed to parse config: expected a JSON object".to_string(),
            ));
        };

        let mut settings = Self::default();
        for (key, value) in &map {
            if let Err(e) = settings.set_key(key, value) {
                warn!("Ignoring stored value for {}: {}", key, e);
            }
        }

        Ok(settings)
    }

    /// Save settings to a JSON file, creating the parent directory if needed
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create config directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Storage(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Merge the given keys into these settings
    ///
    /// All keys are validated before any is applied: on error the settings
    /// are left untouched.
    ///
    /// # Returns
    /// Whether any value actually changed
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for unknown keys or invalid values.
    pub fn merge(&mut self, updates: &Map<String, Value>) -> Result<bool> {
        let mut candidate = self.clone();
        for (key, value) in updates {
            candidate.set_key(key, value)?;
        }

        let changed = candidate != *self;
        *self = candidate;
        Ok(changed)
    }

    /// Render the settings as a flat key-value mapping
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            KEY_FORWARDER_HOST.to_string(),
            Value::from(self.forwarder_host.clone()),
        );
        map.insert(KEY_FORWARDER_PORT.to_string(), Value::from(self.forwarder_port));
        map.insert(
            KEY_POLL_INTERVAL.to_string(),
            Value::from(self.poll_interval_seconds),
        );
        map
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    fn set_key(&mut self, key: &str, value: &Value) -> Result<()> {
        match key {
            KEY_FORWARDER_HOST => self.forwarder_host = coerce_host(value)?,
            KEY_FORWARDER_PORT => self.forwarder_port = coerce_port(value)?,
            KEY_POLL_INTERVAL => self.poll_interval_seconds = coerce_interval(value)?,
            other => {
                debug!("Rejecting unknown config key {}", other);
                return Err(Error::Config(format!("Unknown config key: {}", other)));
            }
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            forwarder_host: DEFAULT_FORWARDER_HOST.to_string(),
            forwarder_port: DEFAULT_FORWARDER_PORT,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// Accept a JSON integer or a string holding one
fn coerce_integer(key: &str, value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| Error::Config(format!("{} must be an integer, got {}", key, value)))
}

fn coerce_host(value: &Value) -> Result<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(Error::Config(format!(
            "{} must be a non-empty string, got {}",
            KEY_FORWARDER_HOST, value
        ))),
    }
}

fn coerce_port(value: &Value) -> Result<u16> {
    let port = coerce_integer(KEY_FORWARDER_PORT, value)?;
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(Error::Config(format!(
            "{} must be between 1 and 65535, got {}",
            KEY_FORWARDER_PORT, port
        ))),
    }
}

fn coerce_interval(value: &Value) -> Result<u64> {
    let secs = coerce_integer(KEY_POLL_INTERVAL, value)?;
    if secs <= 0 {
        return Err(Error::Config(format!(
            "{} must be a positive number of seconds, got {}",
            KEY_POLL_INTERVAL, secs
        )));
    }
    Ok(secs as u64)
}
