// Service trait for liveness checking

/// Something the liveness probe asks about.
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// Checks if the service is alive.
    async fn is_alive(&self) -> bool;
}
