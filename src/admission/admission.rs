use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Admission, AdmissionPolicy};
use crate::governor::{HealthState, ResourceGovernor};
use crate::metrics::meter;

/// Connections per second admitted while warm, unless configured.
pub const DEFAULT_WARM_RATE: u32 = 1_000;

// Share of the warm rate allowed as an instant burst under the deny policy.
const BURST_PERCENT: u32 = 10;

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("node is hot")]
    NodeIsHot,
    #[error("node is warm and over its connection quota")]
    NodeIsTooBusy,
}

impl AdmissionError {
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::NodeIsHot => "hot",
            AdmissionError::NodeIsTooBusy => "throttled",
        }
    }
}

/// Anything that can report the node's current health.
pub trait HealthSource: Send + Sync {
    fn current_health_state(&self) -> HealthState;
}

impl HealthSource for ResourceGovernor {
    fn current_health_state(&self) -> HealthState {
        ResourceGovernor::current_health_state(self)
    }
}

/// Decides per inbound connection whether it may proceed.
pub struct AdmissionGate {
    health: Option<Arc<dyn HealthSource>>,
    policy: AdmissionPolicy,
    await_rl: DirectLimiter,
    deny_rl: DirectLimiter,
}

impl AdmissionGate {
    pub fn new(health: Arc<dyn HealthSource>, policy: AdmissionPolicy, warm_rate: u32) -> Self {
        Self::build(Some(health), policy, warm_rate)
    }

    fn build(health: Option<Arc<dyn HealthSource>>, policy: AdmissionPolicy, warm_rate: u32) -> Self {
        let rate = NonZeroU32::new(warm_rate).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(warm_rate / 100 * BURST_PERCENT).unwrap_or(NonZeroU32::MIN);
        Self {
            health,
            policy,
            await_rl: RateLimiter::direct(Quota::per_second(rate)),
            deny_rl: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
        }
    }

    pub fn from_config(health: Arc<dyn HealthSource>, cfg: &Admission) -> Self {
        Self::new(health, cfg.policy, cfg.warm_rate.unwrap_or(DEFAULT_WARM_RATE))
    }

    /// Gate that admits everything.
    pub fn open() -> Self {
        Self::build(None, AdmissionPolicy::Await, DEFAULT_WARM_RATE)
    }

    pub async fn admit(&self) -> Result<(), AdmissionError> {
        let Some(ref health) = self.health else {
            return Ok(());
        };

        let verdict = match health.current_health_state() {
            HealthState::Normal => Ok(()),
            HealthState::Hot => Err(AdmissionError::NodeIsHot),
            HealthState::Warm => match self.policy {
                AdmissionPolicy::Await => {
                    self.await_rl.until_ready().await;
                    Ok(())
                }
                AdmissionPolicy::Deny => self
                    .deny_rl
                    .check()
                    .map_err(|_| AdmissionError::NodeIsTooBusy),
            },
        };

        if let Err(ref e) = verdict {
            meter::inc_connections_rejected(e.reason());
            debug!(
                component = "admission",
                event = "rejected",
                reason = e.reason(),
                "connection rejected"
            );
        }
        verdict
    }
}
