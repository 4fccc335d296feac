// HTTP API controllers for gateway administration endpoints.

pub mod health;
pub mod metrics;
pub mod probe;
pub mod templates;


// Re-export controller types for convenience
pub use health::NodeHealthController;
pub use metrics::PrometheusMetricsController;
pub use probe::LivenessProbeController;
pub use templates::RegisteredTemplatesController;
