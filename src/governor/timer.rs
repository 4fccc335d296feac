//! Disposable timer shared by periodic background loops.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// The timer pool was disposed; no further delays will complete.
    #[error("timer pool disposed")]
    Disposed,
}

/// Source of delays for periodic work.
#[async_trait]
pub trait Timer: Send + Sync {
    /// Completes after `period`, or fails with [`TimerError::Disposed`]
    /// if the pool is (or becomes) disposed first.
    async fn delay(&self, period: Duration) -> Result<(), TimerError>;
}

/// Tokio-backed timer pool. Disposing it wakes every pending delay with
/// [`TimerError::Disposed`]; clones share the same disposal state.
#[derive(Debug, Clone, Default)]
pub struct TimerPool {
    disposed: CancellationToken,
}

impl TimerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool that is disposed together with `parent`.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            disposed: parent.child_token(),
        }
    }

    pub fn dispose(&self) {
        self.disposed.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }
}

#[async_trait]
impl Timer for TimerPool {
    async fn delay(&self, period: Duration) -> Result<(), TimerError> {
        if self.disposed.is_cancelled() {
            return Err(TimerError::Disposed);
        }
        tokio::select! {
            _ = self.disposed.cancelled() => Err(TimerError::Disposed),
            _ = tokio::time::sleep(period) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_delay_elapses() {
        let pool = TimerPool::new();
        let started = tokio::time::Instant::now();
        pool.delay(Duration::from_secs(10)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_wakes_pending_delay() {
        let pool = TimerPool::new();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.delay(Duration::from_secs(3600)).await })
        };
        tokio::task::yield_now().await;
        pool.dispose();
        assert_eq!(waiter.await.unwrap(), Err(TimerError::Disposed));
        assert_eq!(pool.delay(Duration::from_millis(1)).await, Err(TimerError::Disposed));
    }

    #[tokio::test]
    async fn test_child_pool_follows_parent() {
        let parent = CancellationToken::new();
        let pool = TimerPool::child_of(&parent);
        assert!(!pool.is_disposed());
        parent.cancel();
        assert!(pool.is_disposed());
    }
}
