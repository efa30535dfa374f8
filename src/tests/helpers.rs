// Shared test fakes: an in-memory host and a stub port-forward API

use crate::forwarding::{HostError, HostSystem, SessionHandle};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, LOCATION};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Host fake that records every capability call
pub struct MockHost {
    listen_port: Mutex<u16>,
    reachable: AtomicBool,
    fail_configure: AtomicBool,
    fail_sessions: AtomicBool,
    fail_reannounce: AtomicBool,
    sessions: Vec<String>,
    pub probes: Mutex<Vec<u16>>,
    pub set_calls: Mutex<Vec<[u16; 2]>>,
    pub reannounced: Mutex<Vec<SessionHandle>>,
}

impl MockHost {
    pub fn new(listen_port: u16, reachable: bool) -> Self {
        Self {
            listen_port: Mutex::new(listen_port),
            reachable: AtomicBool::new(reachable),
            fail_configure: AtomicBool::new(false),
            fail_sessions: AtomicBool::new(false),
            fail_reannounce: AtomicBool::new(false),
            sessions: vec!["t1".to_string(), "t2".to_string()],
            probes: Mutex::new(Vec::new()),
            set_calls: Mutex::new(Vec::new()),
            reannounced: Mutex::new(Vec::new()),
        }
    }

    pub fn shared(listen_port: u16, reachable: bool) -> Arc<Self> {
        Arc::new(Self::new(listen_port, reachable))
    }

    pub fn listen_port(&self) -> u16 {
        *self.listen_port.lock().unwrap()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn fail_configure(&self) {
        self.fail_configure.store(true, Ordering::SeqCst);
    }

    pub fn fail_sessions(&self) {
        self.fail_sessions.store(true, Ordering::SeqCst);
    }

    pub fn fail_reannounce(&self) {
        self.fail_reannounce.store(true, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    pub fn set_calls(&self) -> Vec<[u16; 2]> {
        self.set_calls.lock().unwrap().clone()
    }

    pub fn reannounce_count(&self) -> usize {
        self.reannounced.lock().unwrap().len()
    }
}

#[async_trait]
impl HostSystem for MockHost {
    async fn get_listen_port(&self) -> u16 {
        self.listen_port()
    }

    async fn test_listen_port(&self, port: u16) -> bool {
        self.probes.lock().unwrap().push(port);
        self.reachable.load(Ordering::SeqCst)
    }

    async fn set_listen_ports(&self, range: [u16; 2]) -> Result<(), HostError> {
        self.set_calls.lock().unwrap().push(range);
        if self.fail_configure.load(Ordering::SeqCst) {
            return Err(HostError::new("listen_ports rejected"));
        }
        *self.listen_port.lock().unwrap() = range[0];
        Ok(())
    }

    async fn get_session_state(&self) -> Result<SessionHandle, HostError> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(HostError::new("session state unavailable"));
        }
        Ok(SessionHandle::new(self.sessions.clone()))
    }

    async fn force_reannounce(&self, sessions: &SessionHandle) -> Result<(), HostError> {
        if self.fail_reannounce.load(Ordering::SeqCst) {
            return Err(HostError::new("tracker unreachable"));
        }
        self.reannounced.lock().unwrap().push(sessions.clone());
        Ok(())
    }
}

/// Stub of the gateway's port-forward API
pub struct StubForwarder {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl StubForwarder {
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serve `status` + `body` on `/v1/portforward`, 404 elsewhere
pub async fn spawn_stub_forwarder(status: u16, body: &'static str) -> StubForwarder {
    spawn_stub_forwarder_with_delay(status, body, Duration::ZERO).await
}

/// Like `spawn_stub_forwarder`, answering only after `delay`
pub async fn spawn_stub_forwarder_with_delay(
    status: u16,
    body: &'static str,
    delay: Duration,
) -> StubForwarder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let server_hits = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };
            let hits = server_hits.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let hits = hits.clone();
                    async move {
                        if req.uri().path() != "/v1/portforward" {
                            let mut response = Response::new(Full::new(Bytes::from("Not Found")));
                            *response.status_mut() = StatusCode::NOT_FOUND;
                            return Ok::<_, Infallible>(response);
                        }

                        hits.fetch_add(1, Ordering::SeqCst);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }

                        let mut response = Response::new(Full::new(Bytes::from(body)));
                        *response.status_mut() = StatusCode::from_u16(status).unwrap();
                        Ok(response)
                    }
                });

                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    StubForwarder { addr, hits }
}

/// A local port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Answer `/v1/portforward` with `302 Location: /elsewhere`, which serves a valid port
pub async fn spawn_redirecting_forwarder() -> StubForwarder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let server_hits = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };
            let hits = server_hits.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        let response = if req.uri().path() == "/v1/portforward" {
                            let mut response = Response::new(Full::new(Bytes::new()));
                            *response.status_mut() = StatusCode::FOUND;
                            response
                                .headers_mut()
                                .insert(LOCATION, HeaderValue::from_static("/elsewhere"));
                            response
                        } else {
                            Response::new(Full::new(Bytes::from(r#"{"port": 40000}"#)))
                        };
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    StubForwarder { addr, hits }
}
