//! Prometheus metrics functionality.
//
//! Metrics organization:
//! - Gateway metrics: metrics::meter (node health, resolution, connections)
//! - Process metrics: metrics-process (process_resident_memory_bytes, process_cpu_*, etc.)

pub mod meter;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use metrics_process::Collector;
use once_cell::sync::OnceCell;

pub use meter::*;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
static PROC_COLLECTOR: OnceCell<Collector> = OnceCell::new();

/// Installs the global Prometheus recorder and the process collector.
/// Must run before the tokio runtime starts.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;
    let _ = PROM_HANDLE.set(handle);

    let collector = Collector::default();
    collector.describe();
    let _ = PROC_COLLECTOR.set(collector);
    Ok(())
}

/// Renders the exposition text, refreshing process metrics first.
pub fn scrape_prometheus_text() -> Option<String> {
    let h = PROM_HANDLE.get()?;
    if let Some(c) = PROC_COLLECTOR.get() {
        c.collect();
    }
    Some(h.render())
}
