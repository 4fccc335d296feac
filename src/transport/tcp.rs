use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::TransportHandler;
use crate::admission::AdmissionGate;
use crate::metrics::meter;
use crate::registry::ServiceRegistry;

pub const SCHEME: &str = "tcp";

/// Plain TCP transport. Every connection is resolved by the address it was
/// accepted on, i.e. `tcp://{local_addr}`.
pub struct TcpTransport {
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    gate: Arc<AdmissionGate>,
    shutdown_token: CancellationToken,
    accept_loop: Mutex<Option<JoinHandle<()>>>,
    active: Arc<AtomicUsize>,
}

impl TcpTransport {
    /// Binds right away so the bound address is known before registration.
    pub async fn bind(
        addr: SocketAddr,
        gate: Arc<AdmissionGate>,
        shutdown_token: CancellationToken,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind tcp transport on {}", addr))?;
        let local_addr = listener.local_addr().context("read bound address")?;
        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            gate,
            shutdown_token: shutdown_token.child_token(),
            accept_loop: Mutex::new(None),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently handed to a service.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Waits for the accept loop to exit after [`close`](TransportHandler::close).
    pub async fn closed(&self) {
        let handle = self.accept_loop.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[async_trait::async_trait]
impl TransportHandler for TcpTransport {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    async fn open(&self, registry: Arc<ServiceRegistry>) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .take()
            .context("tcp transport is already open")?;

        info!(
            component = "transport",
            scheme = SCHEME,
            event = "listening",
            addr = %self.local_addr,
            "transport is listening"
        );

        let gate = self.gate.clone();
        let token = self.shutdown_token.clone();
        let active = self.active.clone();
        let handle = tokio::spawn(accept_loop(listener, registry, gate, active, token));
        *self.accept_loop.lock() = Some(handle);
        Ok(())
    }

    fn close(&self) {
        self.shutdown_token.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ServiceRegistry>,
    gate: Arc<AdmissionGate>,
    active: Arc<AtomicUsize>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(component = "transport", scheme = SCHEME, event = "closed", "transport stopped accepting");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let registry = registry.clone();
                    let gate = gate.clone();
                    let active = active.clone();
                    let token = token.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = dispatch(stream, peer, registry, gate, active) => {}
                        }
                    });
                }
                Err(e) => {
                    warn!(
                        component = "transport",
                        scheme = SCHEME,
                        event = "accept_failed",
                        error = %e,
                        "failed to accept connection"
                    );
                }
            }
        }
    }
}

/// Request URI for a connection accepted on `local`.
pub fn request_uri(local: SocketAddr) -> Result<Url> {
    Url::parse(&format!("{}://{}", SCHEME, local))
        .with_context(|| format!("build request uri for {}", local))
}

async fn dispatch(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ServiceRegistry>,
    gate: Arc<AdmissionGate>,
    active: Arc<AtomicUsize>,
) {
    let uri = match stream.local_addr().map_err(anyhow::Error::from).and_then(request_uri) {
        Ok(uri) => uri,
        Err(e) => {
            warn!(component = "transport", event = "local_addr_failed", peer = %peer, error = %e, "dropping connection");
            return;
        }
    };

    // Resolution failures are logged by the registry.
    let Ok(service) = registry.resolve(&uri) else {
        meter::inc_connections_rejected("unresolved");
        return;
    };

    if gate.admit().await.is_err() {
        return;
    }

    meter::inc_connections(SCHEME);
    let _slot = ActiveConnection::acquire(active);
    debug!(
        component = "transport",
        event = "dispatched",
        peer = %peer,
        uri = %uri,
        service = service.name(),
        "connection dispatched"
    );

    if let Err(e) = service.serve(stream, peer).await {
        error!(
            component = "transport",
            event = "serve_failed",
            peer = %peer,
            service = service.name(),
            error = %format!("{:#}", e),
            "service failed on connection"
        );
    }
}

/// One slot of the active-connection count, released on drop. The dispatch
/// future may be dropped mid-serve on shutdown or unwound by a panic.
struct ActiveConnection {
    active: Arc<AtomicUsize>,
}

impl ActiveConnection {
    fn acquire(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        meter::add_active_connections(1.0);
        Self { active }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        meter::add_active_connections(-1.0);
    }
}
