//! Services the registry dispatches connections to.

use anyhow::Result;
use std::net::SocketAddr;
use tokio::net::TcpStream;

pub mod cassandra;

pub use cassandra::CassandraService;

/// A backend service reachable through the gateway.
#[async_trait::async_trait]
pub trait GatewayService: Send + Sync {
    /// Service name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Takes ownership of an accepted connection and serves it to completion.
    async fn serve(&self, stream: TcpStream, peer: SocketAddr) -> Result<()>;
}
