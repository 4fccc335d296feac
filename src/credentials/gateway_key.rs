use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConfigProvider;
use crate::governor::{Timer, TimerError};
use crate::metrics::meter;

pub const PRIMARY_KEY_SETTING: &str = "primaryComputeGatewayKey";
pub const SECONDARY_KEY_SETTING: &str = "secondaryComputeGatewayKey";
pub const USE_SECONDARY_KEY_SETTING: &str = "useSecondaryComputeGatewayKey";
/// Derived setting holding the decoded active key.
pub const ACTIVE_KEY_SETTING: &str = "computeGatewayKey";

/// Turns a stored key setting into its usable form.
pub trait KeyDecoder: Send + Sync {
    fn decode(&self, setting: &str, raw: &str) -> Result<String>;
}

/// Decoder for hosts that store keys in the clear.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainKeyDecoder;

impl KeyDecoder for PlainKeyDecoder {
    fn decode(&self, _setting: &str, raw: &str) -> Result<String> {
        Ok(raw.trim().to_string())
    }
}

/// Keeps the active compute gateway key current.
///
/// Which key is active is decided on every refresh, so flipping
/// `useSecondaryComputeGatewayKey` rotates keys without a restart.
pub struct GatewayKeyRefresher {
    provider: Arc<dyn ConfigProvider>,
    decoder: Arc<dyn KeyDecoder>,
    timer: Arc<dyn Timer>,
    interval: Duration,
    active: ArcSwap<String>,
}

impl GatewayKeyRefresher {
    pub fn new(
        provider: Arc<dyn ConfigProvider>,
        decoder: Arc<dyn KeyDecoder>,
        timer: Arc<dyn Timer>,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            decoder,
            timer,
            interval,
            active: ArcSwap::from_pointee(String::new()),
        }
    }

    /// The key currently in use; empty until the first successful refresh.
    pub fn current_key(&self) -> Arc<String> {
        self.active.load_full()
    }

    fn active_setting(&self) -> &'static str {
        let use_secondary = self
            .provider
            .get_bool(USE_SECONDARY_KEY_SETTING)
            .unwrap_or(false);
        if use_secondary {
            SECONDARY_KEY_SETTING
        } else {
            PRIMARY_KEY_SETTING
        }
    }

    /// Reads, decodes and publishes the active key. Returns whether it changed.
    pub fn refresh(&self) -> Result<bool> {
        let setting = self.active_setting();
        let raw = self
            .provider
            .try_get(setting)
            .with_context(|| format!("setting {} is not configured", setting))?;
        let key = self
            .decoder
            .decode(setting, &raw)
            .with_context(|| format!("failed to decode {}", setting))?;
        if key.is_empty() {
            anyhow::bail!("setting {} decoded to an empty key", setting);
        }

        meter::inc_gateway_key_refreshes();
        if *self.active.load_full() == key {
            return Ok(false);
        }

        self.provider.add_derived(ACTIVE_KEY_SETTING, key.clone());
        self.active.store(Arc::new(key));
        info!(
            component = "credentials",
            event = "key_rotated",
            setting = setting,
            "compute gateway key updated"
        );
        Ok(true)
    }

    /// Spawns the periodic refresh loop. Stops once the timer is disposed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    async fn run(&self) {
        loop {
            match self.timer.delay(self.interval).await {
                Ok(()) => {
                    if let Err(e) = self.refresh() {
                        warn!(
                            component = "credentials",
                            event = "refresh_failed",
                            error = %format!("{:#}", e),
                            "compute gateway key refresh failed, keeping previous key"
                        );
                    }
                }
                Err(TimerError::Disposed) => {
                    debug!(component = "credentials", event = "stopped", "key refresher stopped");
                    return;
                }
            }
        }
    }
}
