// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

pub mod provider;

pub use provider::{ConfigProvider, HostSettings};

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const TEST: &str = "test";

/// Key refresh interval used when the gateway section does not set one.
pub const DEFAULT_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_CASSANDRA_PORT: u16 = 10350;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cassgate {
    #[serde(rename = "cassgate")]
    pub cassgate: CassgateBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CassgateBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub api: Option<Api>,
    pub gateway: Gateway,
    pub cassandra: Option<Cassandra>,
    pub governor: Option<Governor>,
    pub admission: Option<Admission>,
    pub k8s: Option<K8S>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    pub port: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Gateway {
    /// Single-tenant emulator: services resolve by scheme and port only.
    #[serde(default)]
    pub local_emulator: bool,
    /// Bind every interface instead of the node address.
    #[serde(default)]
    pub emulated: bool,
    /// Bind loopback only. Wins over `emulated`.
    #[serde(default)]
    pub local_host_only: bool,
    /// Node address used when neither of the above applies.
    pub address: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub key_refresh_interval: Option<Duration>,
    /// Host-provided naming settings, read through [`ConfigProvider`].
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cassandra {
    pub enabled: bool,
    pub port: Option<u16>,
    /// Address of the store endpoint accepted connections are relayed to.
    pub backend: String,
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    /// Extra URI templates the service answers to in multi-tenant mode.
    #[serde(default)]
    pub templates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Governor {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Hold connections until the warm-state quota frees up.
    #[default]
    Await,
    /// Reject connections over the warm-state quota.
    Deny,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Admission {
    pub enabled: bool,
    #[serde(default)]
    pub policy: AdmissionPolicy,
    /// Connections per second admitted while the node is warm.
    pub warm_rate: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Probe {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct K8S {
    pub probe: Probe,
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_dev(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn api(&self) -> Option<&Api>;
    fn gateway(&self) -> &Gateway;
    fn cassandra(&self) -> Option<&Cassandra>;
    fn governor(&self) -> Option<&Governor>;
    fn admission(&self) -> Option<&Admission>;
    fn k8s(&self) -> Option<&K8S>;
}

// Config type alias for convenience
pub type Config = Cassgate;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.cassgate.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.cassgate.env == PROD
    }

    fn is_dev(&self) -> bool {
        self.cassgate.env == DEV
    }

    fn is_test(&self) -> bool {
        self.cassgate.env == TEST
    }

    fn api(&self) -> Option<&Api> {
        self.cassgate.api.as_ref()
    }

    fn gateway(&self) -> &Gateway {
        &self.cassgate.gateway
    }

    fn cassandra(&self) -> Option<&Cassandra> {
        self.cassgate.cassandra.as_ref().filter(|c| c.enabled)
    }

    fn governor(&self) -> Option<&Governor> {
        self.cassgate.governor.as_ref().filter(|g| g.enabled)
    }

    fn admission(&self) -> Option<&Admission> {
        self.cassgate.admission.as_ref().filter(|a| a.enabled)
    }

    fn k8s(&self) -> Option<&K8S> {
        self.cassgate.k8s.as_ref()
    }
}

impl Gateway {
    pub fn key_refresh_interval(&self) -> Duration {
        self.key_refresh_interval
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_KEY_REFRESH_INTERVAL)
    }
}

impl Cassandra {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_CASSANDRA_PORT)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        let cfg = Self::from_yaml(&data).with_context(|| format!("load config from {:?}", abs_path))?;
        Ok(cfg)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Cassgate = serde_yaml::from_str(data).context("unmarshal yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let gateway = self.gateway();
        if let Some(ref address) = gateway.address {
            address
                .parse::<IpAddr>()
                .with_context(|| format!("invalid gateway.address {:?}", address))?;
        } else if !gateway.local_host_only && !gateway.emulated {
            anyhow::bail!("gateway.address is required unless local_host_only or emulated is set");
        }

        if let Some(cassandra) = self.cassandra() {
            if cassandra.port() == 0 {
                anyhow::bail!("cassandra.port must be non-zero");
            }
            if cassandra.backend.trim().is_empty() {
                anyhow::bail!("cassandra.backend is required when cassandra is enabled");
            }
        }

        if let Some(admission) = self.admission() {
            if admission.warm_rate == Some(0) {
                anyhow::bail!("admission.warm_rate must be positive");
            }
        }
        Ok(())
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
