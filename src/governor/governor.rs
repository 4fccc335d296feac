//! Node resource governor: periodic load sampling and health classification.

use anyhow::anyhow;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::health::{HealthState, HealthTransition, HeatMap};
use super::sampler::{LoadSample, LoadSampler};
use super::timer::{Timer, TimerError};
use crate::metrics::meter;

/// Time between two evaluations.
pub const EVAL_INTERVAL: Duration = Duration::from_secs(10);

const TRANSITIONS_CAPACITY: usize = 16;

/// Samples node load on a fixed cadence and publishes coarse health changes.
///
/// Readers call [`current_health_state`](Self::current_health_state) from any
/// thread; a single background task owned by [`start`](Self::start) writes it.
pub struct ResourceGovernor {
    heat_map: HeatMap,
    samplers: Mutex<Vec<Box<dyn LoadSampler>>>,
    state: AtomicU8,
    transitions: broadcast::Sender<HealthTransition>,
    timer: Arc<dyn Timer>,
}

impl ResourceGovernor {
    pub fn new(samplers: Vec<Box<dyn LoadSampler>>, timer: Arc<dyn Timer>) -> Self {
        Self::with_heat_map(HeatMap::default(), samplers, timer)
    }

    pub fn with_heat_map(
        heat_map: HeatMap,
        samplers: Vec<Box<dyn LoadSampler>>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITIONS_CAPACITY);
        meter::set_health_state(HealthState::Normal);
        Self {
            heat_map,
            samplers: Mutex::new(samplers),
            state: AtomicU8::new(HealthState::Normal.as_u8()),
            transitions,
            timer,
        }
    }

    pub fn current_health_state(&self) -> HealthState {
        HealthState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Receives every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthTransition> {
        self.transitions.subscribe()
    }

    pub fn heat_map(&self) -> &HeatMap {
        &self.heat_map
    }

    /// Runs one evaluation tick. A panicking sampler is logged and leaves the
    /// state as is.
    ///
    /// Returns the transition if the state changed.
    pub fn evaluate(&self) -> Option<HealthTransition> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.collect_samples()))
            .map_err(|payload| anyhow!("sampler panicked: {}", panic_message(&payload)));

        let samples = match outcome {
            Ok(samples) => samples,
            Err(e) => {
                meter::inc_governor_tick_errors();
                error!(
                    component = "governor",
                    event = "tick_failed",
                    error = %e,
                    "node health evaluation failed, state unchanged"
                );
                return None;
            }
        };

        let next = self.heat_map.classify_all(samples.iter().map(|s| s.value))?;
        let previous = HealthState::from_u8(self.state.swap(next.as_u8(), Ordering::AcqRel));
        if previous == next {
            return None;
        }

        let transition = HealthTransition {
            previous,
            current: next,
        };
        self.announce(transition, &samples);
        Some(transition)
    }

    /// Spawns the evaluation loop. The loop ends once the timer is disposed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    async fn run(&self) {
        info!(
            component = "governor",
            event = "started",
            interval = ?EVAL_INTERVAL,
            "node resource governor started"
        );
        loop {
            match self.timer.delay(EVAL_INTERVAL).await {
                Ok(()) => {
                    self.evaluate();
                }
                Err(TimerError::Disposed) => {
                    info!(
                        component = "governor",
                        event = "stopped",
                        "timer disposed, node resource governor stopped"
                    );
                    return;
                }
            }
        }
    }

    // A sampler error only drops that sampler's reading; a panic unwinds
    // through here and aborts the whole tick.
    fn collect_samples(&self) -> Vec<LoadSample> {
        let mut samplers = self.samplers.lock();
        let mut samples = Vec::with_capacity(samplers.len());
        for sampler in samplers.iter_mut() {
            match sampler.sample() {
                Ok(Some(sample)) => {
                    meter::set_load_sample(&sample.name, sample.value);
                    samples.push(sample);
                }
                Ok(None) => debug!(
                    component = "governor",
                    event = "sample_unavailable",
                    sampler = sampler.name(),
                    "no reading this tick"
                ),
                Err(e) => {
                    meter::inc_load_sample_errors(sampler.name());
                    warn!(
                        component = "governor",
                        event = "sample_failed",
                        sampler = sampler.name(),
                        error = %e,
                        "load sampler failed, reading skipped"
                    );
                }
            }
        }
        samples
    }

    fn announce(&self, transition: HealthTransition, samples: &[LoadSample]) {
        meter::set_health_state(transition.current);
        meter::inc_health_transitions();

        let readings = samples
            .iter()
            .map(|s| format!("{}={:.1}", s.name, s.value))
            .collect::<Vec<_>>()
            .join(", ");

        match transition.current {
            HealthState::Hot => error!(
                component = "governor",
                event = "health_changed",
                previous = %transition.previous,
                current = %transition.current,
                readings = %readings,
                "node is hot"
            ),
            HealthState::Warm => warn!(
                component = "governor",
                event = "health_changed",
                previous = %transition.previous,
                current = %transition.current,
                readings = %readings,
                "node is warm"
            ),
            HealthState::Normal => {}
        }

        // No subscribers is fine.
        let _ = self.transitions.send(transition);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
