use crate::governor::HealthState;

// Metric name constants
pub const NODE_HEALTH_STATE: &str = "node_health_state";
pub const NODE_HEALTH_TRANSITIONS: &str = "node_health_transitions_total";
pub const GOVERNOR_TICK_ERRORS: &str = "governor_tick_errors_total";
pub const LOAD_SAMPLE: &str = "node_load_percent";
pub const LOAD_SAMPLE_ERRORS: &str = "load_sample_errors_total";

pub const REGISTRY_COLLISIONS: &str = "registry_collisions_total";
pub const RESOLVE_FAILURES: &str = "resolve_failures_total";

pub const CONNECTIONS: &str = "connections_total";
pub const CONNECTIONS_REJECTED: &str = "connections_rejected_total";
pub const CONNECTIONS_ACTIVE: &str = "connections_active";

pub const GATEWAY_KEY_REFRESHES: &str = "gateway_key_refreshes_total";

/// Sets the current node health state (0 normal, 1 warm, 2 hot).
pub fn set_health_state(state: HealthState) {
    metrics::gauge!(NODE_HEALTH_STATE).set(state.as_u8() as f64);
}

pub fn inc_health_transitions() {
    metrics::counter!(NODE_HEALTH_TRANSITIONS).increment(1);
}

pub fn inc_governor_tick_errors() {
    metrics::counter!(GOVERNOR_TICK_ERRORS).increment(1);
}

/// Records the latest reading of a named load sample.
pub fn set_load_sample(name: &str, value: f32) {
    metrics::gauge!(LOAD_SAMPLE, "sample" => name.to_string()).set(value as f64);
}

pub fn inc_load_sample_errors(name: &str) {
    metrics::counter!(LOAD_SAMPLE_ERRORS, "sample" => name.to_string()).increment(1);
}

pub fn inc_registry_collisions() {
    metrics::counter!(REGISTRY_COLLISIONS).increment(1);
}

pub fn inc_resolve_failures() {
    metrics::counter!(RESOLVE_FAILURES).increment(1);
}

pub fn inc_connections(scheme: &str) {
    metrics::counter!(CONNECTIONS, "scheme" => scheme.to_string()).increment(1);
}

/// Counts a connection turned away, labelled by the reason.
pub fn inc_connections_rejected(reason: &'static str) {
    metrics::counter!(CONNECTIONS_REJECTED, "reason" => reason).increment(1);
}

pub fn add_active_connections(delta: f64) {
    metrics::gauge!(CONNECTIONS_ACTIVE).increment(delta);
}

pub fn inc_gateway_key_refreshes() {
    metrics::counter!(GATEWAY_KEY_REFRESHES).increment(1);
}
