//! Metrics controller.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::http::Controller;
use crate::metrics::scrape_prometheus_text;

pub const PROMETHEUS_METRICS_PATH: &str = "/metrics";

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Serves the Prometheus exposition text.
#[derive(Clone, Default)]
pub struct PrometheusMetricsController;

impl PrometheusMetricsController {
    pub fn new() -> Self {
        Self
    }

    async fn get_metrics() -> impl IntoResponse {
        match scrape_prometheus_text() {
            Some(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
            None => (
                StatusCode::SERVICE_UNAVAILABLE,
                "metrics recorder is not installed",
            )
                .into_response(),
        }
    }
}

impl Controller for PrometheusMetricsController {
    fn add_route(&self, router: Router) -> Router {
        router.route(PROMETHEUS_METRICS_PATH, get(Self::get_metrics))
    }
}
