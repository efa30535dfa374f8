//! Management surface over HTTP
//!
//! Serves the plugin's configuration calls as JSON endpoints:
//! - `GET /config` - current configuration
//! - `POST /config` - merge a JSON object into the configuration
//! - `GET /status` - whether polling is enabled and the last cycle outcome
//! - `GET /health` - liveness check

use crate::forwarding::CycleReport;
use crate::plugin::PortSyncPlugin;
use crate::{Error, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Largest accepted `POST /config` body
pub const MAX_CONFIG_BODY_BYTES: usize = 16 * 1024;

/// Body of `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    /// Whether the scheduler is running
    pub enabled: bool,
    /// Most recent finished cycle, if any
    pub last_cycle: Option<CycleReport>,
}

/// HTTP server exposing the management surface
pub struct ControlServer {
    plugin: PortSyncPlugin,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Create a server for `plugin`; nothing is bound until `start`
    pub fn new(plugin: PortSyncPlugin) -> Self {
        Self {
            plugin,
            local_addr: None,
            task: None,
        }
    }

    /// Bind to `addr` and serve requests in the background
    ///
    /// Port 0 picks a free port; see [`ControlServer::local_addr`].
    pub async fn start(&mut self, addr: SocketAddr) -> Result<()> {
        info!("Starting control server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Control(format!("Failed to bind to {}: {}", addr, e)))?;

        let actual_addr = listener
            .local_addr()
            .map_err(|e| Error::Control(format!("Failed to get local address: {}", e)))?;
        self.local_addr = Some(actual_addr);

        let plugin = self.plugin.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote_addr)) => {
                        debug!("Accepted control connection from {}", remote_addr);

                        let io = TokioIo::new(stream);
                        let plugin = plugin.clone();

                        tokio::spawn(async move {
                            let service =
                                service_fn(move |req| handle_request(req, plugin.clone()));

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!("Error serving control connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept control connection: {}", e);
                    }
                }
            }
        });

        self.task = Some(task);
        info!("Control server listening on {}", actual_addr);
        Ok(())
    }

    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop accepting connections
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Control server stopped");
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn respond_json<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(json) => respond(StatusCode::OK, "application/json", json),
        Err(e) => {
            error!("Failed to serialize control response: {}", e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("Failed to serialize response: {}", e),
            )
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    plugin: PortSyncPlugin,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/config") => {
            debug!("Received GET /config request");
            Ok(respond_json(&plugin.get_config().await))
        }
        (&Method::POST, "/config") => {
            debug!("Received POST /config request");

            let body = match Limited::new(req.into_body(), MAX_CONFIG_BODY_BYTES)
                .collect()
                .await
            {
                Ok(collected) => collected.to_bytes(),
                Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                    warn!("Rejected config update: body exceeds {} bytes", MAX_CONFIG_BODY_BYTES);
                    return Ok(respond(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "text/plain",
                        format!("Config update must not exceed {} bytes", MAX_CONFIG_BODY_BYTES),
                    ));
                }
                Err(e) => {
                    warn!("Failed to read config update body: {}", e);
                    return Ok(respond(
                        StatusCode::BAD_REQUEST,
                        "text/plain",
                        format!("Failed to read body: {}", e),
                    ));
                }
            };
            let updates = match serde_json::from_slice::<Value>(&body) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("Rejected config update: body is not a JSON object");
                    return Ok(respond(
                        StatusCode::BAD_REQUEST,
                        "text/plain",
                        "Config update must be a JSON object",
                    ));
                }
                Err(e) => {
                    warn!("Rejected config update: {}", e);
                    return Ok(respond(
                        StatusCode::BAD_REQUEST,
                        "text/plain",
                        format!("Invalid JSON: {}", e),
                    ));
                }
            };

            match plugin.set_config(&updates).await {
                Ok(()) => Ok(respond(StatusCode::NO_CONTENT, "text/plain", Bytes::new())),
                Err(e @ Error::Config(_)) => {
                    warn!("Rejected config update: {}", e);
                    Ok(respond(StatusCode::BAD_REQUEST, "text/plain", e.to_string()))
                }
                Err(e) => {
                    error!("Failed to apply config update: {}", e);
                    Ok(respond(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "text/plain",
                        e.to_string(),
                    ))
                }
            }
        }
        (&Method::GET, "/status") => {
            debug!("Received GET /status request");
            let status = StatusResponse {
                enabled: plugin.is_enabled().await,
                last_cycle: plugin.last_cycle().await,
            };
            Ok(respond_json(&status))
        }
        (&Method::GET, "/health") => Ok(respond(StatusCode::OK, "text/plain", "ok")),
        _ => {
            debug!(
                "Received unsupported request: {} {}",
                req.method(),
                req.uri().path()
            );
            Ok(respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"))
        }
    }
}
