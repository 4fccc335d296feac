use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::service::GatewayService;

/// Service that only has a name; serving drops the connection.
pub struct NamedService {
    name: String,
}

impl NamedService {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl GatewayService for NamedService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn serve(&self, _stream: TcpStream, _peer: SocketAddr) -> Result<()> {
        Ok(())
    }
}

/// Writes its name, then echoes whatever the client sends until EOF.
pub struct EchoService {
    name: String,
    served: AtomicUsize,
}

impl EchoService {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            served: AtomicUsize::new(0),
        })
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GatewayService for EchoService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn serve(&self, mut stream: TcpStream, _peer: SocketAddr) -> Result<()> {
        self.served.fetch_add(1, Ordering::SeqCst);
        stream.write_all(self.name.as_bytes()).await?;
        stream.write_all(b"\n").await?;

        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            stream.write_all(&buf[..n]).await?;
        }
    }
}

/// Compares two service handles by identity.
pub fn same_service(a: &Arc<dyn GatewayService>, b: &Arc<dyn GatewayService>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Starts a plain tcp echo server standing in for a store node.
pub async fn spawn_echo_backend() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}
