use super::{Admission, AdmissionPolicy, Api, Cassandra, CassgateBox, Config, Gateway, Governor, Logs, Probe, K8S};
use std::collections::HashMap;
use std::time::Duration;

/// Creates a new test configuration: loopback-only emulator with every
/// feature switched on.
pub fn new_test_config() -> Config {
    Config {
        cassgate: CassgateBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            api: Some(Api {
                name: Some("cassgate:0".to_string()),
                port: Some("0".to_string()),
            }),
            gateway: Gateway {
                local_emulator: true,
                emulated: false,
                local_host_only: true,
                address: None,
                key_refresh_interval: Some(Duration::from_secs(300)),
                settings: HashMap::from([
                    ("primaryComputeGatewayKey".to_string(), "primary-key".to_string()),
                    ("secondaryComputeGatewayKey".to_string(), "secondary-key".to_string()),
                    ("useSecondaryComputeGatewayKey".to_string(), "false".to_string()),
                ]),
            },
            cassandra: Some(Cassandra {
                enabled: true,
                port: Some(0),
                backend: "127.0.0.1:9042".to_string(),
                connect_timeout: Some(Duration::from_secs(1)),
                templates: Vec::new(),
            }),
            governor: Some(Governor { enabled: true }),
            admission: Some(Admission {
                enabled: true,
                policy: AdmissionPolicy::Await,
                warm_rate: Some(1_000),
            }),
            k8s: Some(K8S {
                probe: Probe {
                    timeout: Some(Duration::from_secs(5)),
                },
            }),
        },
    }
}
