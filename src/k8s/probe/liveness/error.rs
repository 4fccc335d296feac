// Error definitions for liveness probe

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("liveness probe timeout is too short")]
pub struct TimeoutIsTooShortError;
