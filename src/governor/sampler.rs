//! Node load samplers.

use anyhow::Result;
use sysinfo::System;

pub const CPU_SAMPLE_NAME: &str = "\\Processor\\% Processor Time";
pub const MEMORY_SAMPLE_NAME: &str = "\\Memory\\% Physical MemoryInUse";

/// A single named load reading, as a percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSample {
    pub name: String,
    pub value: f32,
}

impl LoadSample {
    pub fn new(name: impl Into<String>, value: f32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Source of one load metric.
///
/// `Ok(None)` means no reading is available this tick (counter missing on this
/// platform, not warmed up yet). `Err` is logged and counted, and the tick goes
/// on with the other samplers. Only a panic aborts the tick.
pub trait LoadSampler: Send {
    fn name(&self) -> &str;

    fn sample(&mut self) -> Result<Option<LoadSample>>;
}

/// Global CPU usage across all cores.
pub struct CpuSampler {
    sys: System,
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        // Usage is computed between two refreshes; prime the first one.
        sys.refresh_cpu();
        Self { sys }
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSampler for CpuSampler {
    fn name(&self) -> &str {
        CPU_SAMPLE_NAME
    }

    fn sample(&mut self) -> Result<Option<LoadSample>> {
        self.sys.refresh_cpu();
        if self.sys.cpus().is_empty() {
            return Ok(None);
        }
        let usage = self.sys.global_cpu_info().cpu_usage();
        if !usage.is_finite() {
            return Ok(None);
        }
        Ok(Some(LoadSample::new(CPU_SAMPLE_NAME, usage)))
    }
}

/// Physical memory in use, derived from available over total.
pub struct MemorySampler {
    sys: System,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSampler for MemorySampler {
    fn name(&self) -> &str {
        MEMORY_SAMPLE_NAME
    }

    fn sample(&mut self) -> Result<Option<LoadSample>> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Ok(None);
        }
        let available = self.sys.available_memory().min(total);
        Ok(Some(LoadSample::new(
            MEMORY_SAMPLE_NAME,
            memory_in_use_percent(total, available),
        )))
    }
}

fn memory_in_use_percent(total: u64, available: u64) -> f32 {
    ((total - available) as f64 / total as f64 * 100.0) as f32
}

/// Samplers watched by a node governor by default.
pub fn default_samplers() -> Vec<Box<dyn LoadSampler>> {
    vec![Box::new(CpuSampler::new()), Box::new(MemorySampler::new())]
}
