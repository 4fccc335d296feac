//! Node resource governance.

pub mod governor;
pub mod health;
pub mod sampler;
pub mod timer;

#[cfg(test)]
mod governor_test;

pub use governor::{ResourceGovernor, EVAL_INTERVAL};
pub use health::{HealthState, HealthTransition, HeatMap, HeatMapEntry, DEFAULT_HEAT_MAP};
pub use sampler::{default_samplers, CpuSampler, LoadSample, LoadSampler, MemorySampler};
pub use timer::{Timer, TimerError, TimerPool};
