//! Cassandra endpoint service.
//!
//! Frames are not decoded here: the connection is relayed byte for byte to
//! the configured backend node.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::GatewayService;

pub const SERVICE_NAME: &str = "cassandra";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CassandraService {
    backend: String,
    connect_timeout: Duration,
}

impl CassandraService {
    pub fn new(backend: impl Into<String>, connect_timeout: Option<Duration>) -> Self {
        Self {
            backend: backend.into(),
            connect_timeout: connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }
}

#[async_trait::async_trait]
impl GatewayService for CassandraService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn serve(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let mut upstream = timeout(self.connect_timeout, TcpStream::connect(&self.backend))
            .await
            .with_context(|| format!("connect to backend {} timed out", self.backend))?
            .with_context(|| format!("connect to backend {}", self.backend))?;

        let _ = stream.set_nodelay(true);
        let _ = upstream.set_nodelay(true);

        let (from_client, from_backend) = tokio::io::copy_bidirectional(&mut stream, &mut upstream)
            .await
            .with_context(|| format!("relay {} <-> {}", peer, self.backend))?;

        debug!(
            component = "cassandra",
            event = "connection_closed",
            peer = %peer,
            backend = %self.backend,
            from_client,
            from_backend,
            "connection relayed"
        );
        Ok(())
    }
}
