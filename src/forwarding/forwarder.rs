//! Port-forward API client
//!
//! Asks the VPN gateway which port it currently forwards to us. One GET per
//! call, no retries: the next scheduled cycle is the retry.

use super::types::SyncError;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// API path serving the forwarded port
pub const PORT_FORWARD_PATH: &str = "/v1/portforward";

/// Request timeout used by [`ForwarderClient::new`]
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the port-forward URL for a forwarder at `host:port`
pub fn forward_url(host: &str, port: u16) -> String {
    format!("http://{}:{}{}", host, port, PORT_FORWARD_PATH)
}

/// HTTP client for the port-forward API
#[derive(Debug, Clone)]
pub struct ForwarderClient {
    /// Holds the build error if the HTTP client could not be created
    client: Result<reqwest::Client, String>,
    timeout: Duration,
}

impl ForwarderClient {
    /// Create a client with the default request timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests expire after `timeout`
    ///
    /// Redirects are never followed: any 3xx answer is a protocol error.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                error!("Failed to create HTTP client: {}", e);
                e.to_string()
            });

        Self { client, timeout }
    }

    /// Request timeout applied to every fetch
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the currently forwarded port
    ///
    /// # Errors
    ///
    /// * `SyncError::Transport` - connection failed or the request timed out
    /// * `SyncError::Protocol` - the forwarder answered with a status other than 200
    /// * `SyncError::Parse` - the body is not JSON or has no valid integer `port`
    pub async fn fetch_forwarded_port(&self, host: &str, port: u16) -> Result<u16, SyncError> {
        let url = forward_url(host, port);
        debug!("Fetching forwarded port from {}", url);

        let client = self
            .client
            .as_ref()
            .map_err(|e| SyncError::Transport(format!("HTTP client unavailable: {}", e)))?;

        let response = client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::Transport(format!("request to {} timed out", url))
                } else {
                    SyncError::Transport(format!("request to {} failed: {}", url, e))
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SyncError::Protocol {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Transport(format!("failed to read body from {}: {}", url, e)))?;

        let forwarded = parse_forwarded_port(&body)?;
        debug!("Parsed forwarded port: {}", forwarded);
        Ok(forwarded)
    }
}

impl Default for ForwarderClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the forwarded port from a port-forward response body
///
/// The body must be a JSON object whose `port` member is an integer in
/// 1..=65535. The forwarder reports `0` while no port is forwarded yet; that
/// is rejected like any other out-of-range value.
pub fn parse_forwarded_port(body: &[u8]) -> Result<u16, SyncError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::Parse(format!("body is not valid JSON: {}", e)))?;

    let port = value
        .as_object()
        .ok_or_else(|| SyncError::Parse("body is not a JSON object".to_string()))?
        .get("port")
        .ok_or_else(|| SyncError::Parse("missing \"port\" field".to_string()))?;

    if !(port.is_i64() || port.is_u64()) {
        return Err(SyncError::Parse(format!(
            "\"port\" is not an integer: {}",
            port
        )));
    }

    match port.as_u64().and_then(|n| u16::try_from(n).ok()) {
        Some(p) if p > 0 => Ok(p),
        _ => Err(SyncError::Parse(format!("\"port\" out of range: {}", port))),
    }
}
