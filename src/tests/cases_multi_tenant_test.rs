// Multi-tenant resolution across several services and transports.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    use crate::admission::AdmissionGate;
    use crate::registry::{ListenAddress, RegistryError, ServiceRegistry};
    use crate::support::EchoService;
    use crate::transport::{TcpTransport, TransportHandler};

    async fn greeting(transport: &TcpTransport) -> String {
        let stream = TcpStream::connect(transport.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        line
    }

    #[tokio::test]
    async fn test_each_listener_reaches_its_own_service() {
        let token = CancellationToken::new();
        let gate = Arc::new(AdmissionGate::open());
        let cassandra_t = TcpTransport::bind("127.0.0.1:0".parse().unwrap(), gate.clone(), token.clone())
            .await
            .unwrap();
        let mongo_t = TcpTransport::bind("127.0.0.1:0".parse().unwrap(), gate, token.clone())
            .await
            .unwrap();

        let mut registry = ServiceRegistry::new(false);
        registry
            .register(
                EchoService::new("cassandra"),
                &[
                    ListenAddress::scheme_and_port("tcp", cassandra_t.local_addr().to_string()),
                    ListenAddress::template("tcp://{account}.cassandra.example.com:10350").unwrap(),
                ],
            )
            .into_result()
            .unwrap();
        registry
            .register(
                EchoService::new("mongo"),
                &[
                    ListenAddress::scheme_and_port("tcp", mongo_t.local_addr().to_string()),
                    ListenAddress::template("tcp://{account}.mongo.example.com:10255").unwrap(),
                ],
            )
            .into_result()
            .unwrap();
        let registry = Arc::new(registry);

        cassandra_t.open(registry.clone()).await.unwrap();
        mongo_t.open(registry.clone()).await.unwrap();

        assert_eq!(greeting(&cassandra_t).await, "cassandra\n");
        assert_eq!(greeting(&mongo_t).await, "mongo\n");

        for (uri, expected) in [
            ("tcp://contoso.cassandra.example.com:10350", "cassandra"),
            ("tcp://fabrikam.mongo.example.com:10255", "mongo"),
        ] {
            let svc = registry.resolve(&Url::parse(uri).unwrap()).unwrap();
            assert_eq!(svc.name(), expected);
        }
        assert!(registry
            .resolve(&Url::parse("tcp://contoso.mongo.example.com:10350").unwrap())
            .is_err());

        token.cancel();
        cassandra_t.closed().await;
        mongo_t.closed().await;
    }

    #[test]
    fn test_second_tenant_cannot_steal_a_template() {
        let mut registry = ServiceRegistry::new(false);
        registry
            .register(
                EchoService::new("cassandra"),
                &[ListenAddress::template("tcp://{account}.cassandra.example.com:10350").unwrap()],
            )
            .into_result()
            .unwrap();

        let err = registry
            .register(
                EchoService::new("impostor"),
                &[ListenAddress::template("tcp://{tenant}.CASSANDRA.example.com:10350").unwrap()],
            )
            .into_result()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTemplate { .. }));

        let svc = registry
            .resolve(&Url::parse("tcp://contoso.cassandra.example.com:10350").unwrap())
            .unwrap();
        assert_eq!(svc.name(), "cassandra");
    }
}
