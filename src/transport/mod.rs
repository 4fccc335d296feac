//! Inbound transports: accept connections and hand them to resolved services.

pub mod tcp;

#[cfg(test)]
mod tcp_test;

use anyhow::Result;
use std::sync::Arc;

use crate::registry::ServiceRegistry;

pub use tcp::TcpTransport;

/// A listener that dispatches accepted connections through a registry.
#[async_trait::async_trait]
pub trait TransportHandler: Send + Sync {
    fn scheme(&self) -> &'static str;

    /// Starts accepting. Returns once the accept loop is running.
    async fn open(&self, registry: Arc<ServiceRegistry>) -> Result<()>;

    /// Stops accepting and cancels in-flight connections.
    fn close(&self);
}
