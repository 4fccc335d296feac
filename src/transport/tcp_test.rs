// Tests for the tcp transport.

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use crate::admission::{AdmissionGate, HealthSource};
    use crate::config::AdmissionPolicy;
    use crate::governor::HealthState;
    use crate::registry::{ListenAddress, ServiceRegistry};
    use crate::service::GatewayService;
    use crate::support::EchoService;
    use crate::transport::tcp::request_uri;
    use crate::transport::{TcpTransport, TransportHandler};

    const WAIT: Duration = Duration::from_secs(5);

    async fn transport(gate: AdmissionGate) -> TcpTransport {
        TcpTransport::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(gate),
            CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    fn registry_for(addr: SocketAddr, service: Arc<dyn GatewayService>) -> Arc<ServiceRegistry> {
        let mut registry = ServiceRegistry::new(true);
        registry
            .register(service, &[ListenAddress::scheme_and_port("tcp", addr.to_string())])
            .into_result()
            .unwrap();
        Arc::new(registry)
    }

    async fn read_to_close(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        timeout(WAIT, stream.read_to_end(&mut buf)).await.unwrap().unwrap();
        buf
    }

    async fn wait_for_active(t: &TcpTransport, expected: usize) {
        timeout(WAIT, async {
            while t.active_connections() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    struct PanickingService;

    #[async_trait::async_trait]
    impl GatewayService for PanickingService {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn serve(&self, _stream: TcpStream, _peer: SocketAddr) -> Result<()> {
            panic!("service blew up");
        }
    }

    #[test]
    fn test_request_uri_formats() {
        let v4 = request_uri("127.0.0.1:10350".parse().unwrap()).unwrap();
        assert_eq!(v4.as_str(), "tcp://127.0.0.1:10350");
        let v6 = request_uri("[::1]:10350".parse().unwrap()).unwrap();
        assert_eq!(v6.port(), Some(10350));
    }

    #[tokio::test]
    async fn test_dispatches_to_resolved_service() {
        let echo = EchoService::new("cassandra");
        let t = transport(AdmissionGate::open()).await;
        t.open(registry_for(t.local_addr(), echo.clone())).await.unwrap();

        let stream = TcpStream::connect(t.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        timeout(WAIT, reader.read_line(&mut line)).await.unwrap().unwrap();
        assert_eq!(line, "cassandra\n");

        reader.get_mut().write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        timeout(WAIT, reader.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(echo.served(), 1);

        t.close();
        timeout(WAIT, t.closed()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unresolved_connection_is_dropped() {
        let echo = EchoService::new("cassandra");
        let t = transport(AdmissionGate::open()).await;
        // Registered under another port: nothing matches this listener.
        let mut registry = ServiceRegistry::new(true);
        registry
            .register(echo.clone(), &[ListenAddress::scheme_and_port("tcp", "127.0.0.1:1")])
            .into_result()
            .unwrap();
        t.open(Arc::new(registry)).await.unwrap();

        let mut stream = TcpStream::connect(t.local_addr()).await.unwrap();
        assert!(read_to_close(&mut stream).await.is_empty());
        assert_eq!(echo.served(), 0);
        t.close();
    }

    struct Hot;

    impl HealthSource for Hot {
        fn current_health_state(&self) -> HealthState {
            HealthState::Hot
        }
    }

    #[tokio::test]
    async fn test_hot_node_rejects_connections() {
        let echo = EchoService::new("cassandra");
        let t = transport(AdmissionGate::new(Arc::new(Hot), AdmissionPolicy::Await, 100)).await;
        t.open(registry_for(t.local_addr(), echo.clone())).await.unwrap();

        let mut stream = TcpStream::connect(t.local_addr()).await.unwrap();
        assert!(read_to_close(&mut stream).await.is_empty());
        assert_eq!(echo.served(), 0);
        t.close();
    }

    #[tokio::test]
    async fn test_open_twice_fails_and_close_stops_accepting() {
        let echo = EchoService::new("cassandra");
        let t = transport(AdmissionGate::open()).await;
        let registry = registry_for(t.local_addr(), echo);
        t.open(registry.clone()).await.unwrap();
        assert!(t.open(registry).await.is_err());
        assert_eq!(t.scheme(), "tcp");

        t.close();
        timeout(WAIT, t.closed()).await.unwrap();
        // Listener is gone with the accept loop.
        assert!(TcpStream::connect(t.local_addr()).await.is_err());
    }

    #[tokio::test]
    async fn test_close_releases_connections_still_being_served() {
        let echo = EchoService::new("cassandra");
        let t = transport(AdmissionGate::open()).await;
        t.open(registry_for(t.local_addr(), echo)).await.unwrap();

        let stream = TcpStream::connect(t.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        timeout(WAIT, reader.read_line(&mut line)).await.unwrap().unwrap();
        wait_for_active(&t, 1).await;

        // The client keeps the connection open; closing must still release it.
        t.close();
        wait_for_active(&t, 0).await;
        timeout(WAIT, t.closed()).await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_service_releases_its_connection() {
        let t = transport(AdmissionGate::open()).await;
        t.open(registry_for(t.local_addr(), Arc::new(PanickingService)))
            .await
            .unwrap();

        let mut stream = TcpStream::connect(t.local_addr()).await.unwrap();
        assert!(read_to_close(&mut stream).await.is_empty());
        wait_for_active(&t, 0).await;

        let mut again = TcpStream::connect(t.local_addr()).await.unwrap();
        assert!(read_to_close(&mut again).await.is_empty());
        wait_for_active(&t, 0).await;
        t.close();
    }
}
