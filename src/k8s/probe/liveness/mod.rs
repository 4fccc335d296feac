// Package liveness provides Kubernetes liveness probe functionality.

use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

pub mod error;
pub mod service;

pub use error::TimeoutIsTooShortError;
pub use service::Service;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);
const FALLBACK_TIMEOUT: Duration = Duration::from_millis(10);

/// Liveness probe over a set of watched services.
pub struct Probe {
    services: RwLock<Vec<Arc<dyn Service>>>,
    timeout: Duration,
}

impl Probe {
    /// Creates a new liveness probe
    pub fn new(timeout_duration: Duration) -> Self {
        let timeout = if timeout_duration < MIN_TIMEOUT {
            warn!(
                component = "liveness",
                error = %TimeoutIsTooShortError,
                "min timeout duration is 1ms (timeout set up as 10ms as a more reasonable value)"
            );
            FALLBACK_TIMEOUT
        } else {
            timeout_duration
        };

        Self {
            services: RwLock::new(Vec::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Adds services to the watched set.
    pub fn watch(&self, services: Vec<Arc<dyn Service>>) {
        self.services.write().extend(services);
    }

    /// True when every watched service answers alive within the timeout.
    pub async fn is_alive(&self) -> bool {
        let services = self.services.read().clone();
        let checks = join_all(services.iter().map(|s| s.is_alive()));
        match timeout(self.timeout, checks).await {
            Ok(results) => {
                for (service, alive) in services.iter().zip(&results) {
                    if !alive {
                        warn!(component = "liveness", service = service.name(), "service is not alive");
                    }
                }
                results.into_iter().all(|alive| alive)
            }
            Err(_) => {
                warn!(component = "liveness", "liveness probe deadline exceeded while checking services");
                false
            }
        }
    }
}
