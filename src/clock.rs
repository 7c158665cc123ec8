use async_trait::async_trait;
use std::time::Duration;

/// Suspends the single thread of control between retries and polls.
///
/// Production code uses [`TokioSleeper`]; the sleep is cancelled when the
/// enclosing future is dropped, which is how an interrupted run stops.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
