//! Global fetch limiter: a concurrency cap plus a fixed delay per slot.

use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

use scrapewright_core::Error;

/// Caps concurrently in-flight fetches and throttles each one.
#[derive(Debug)]
pub struct RequestLimiter {
    semaphore: Semaphore,
    capacity: usize,
    delay: Duration,
}

/// A held fetch slot; released on drop.
#[derive(Debug)]
pub struct FetchSlot<'a> {
    _permit: SemaphorePermit<'a>,
}

impl RequestLimiter {
    pub fn new(capacity: usize, delay: Duration) -> Self {
        Self { semaphore: Semaphore::new(capacity), capacity, delay }
    }

    /// Wait for a free slot (no timeout), then sleep the configured delay.
    pub async fn acquire(&self) -> Result<FetchSlot<'_>, Error> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::HttpError(format!("fetch limiter closed: {e}")))?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(FetchSlot { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for RequestLimiter {
    /// 10 slots, one second apart.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_acquire_applies_delay() {
        let limiter = RequestLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();

        let slot = limiter.acquire().await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(limiter.available(), 1);
        drop(slot);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_free_slot() {
        let limiter = std::sync::Arc::new(RequestLimiter::new(1, Duration::ZERO));
        let held = limiter.acquire().await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _slot = limiter.acquire().await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(limiter.available(), 1);
    }

    #[test]
    fn test_default_capacity() {
        let limiter = RequestLimiter::default();
        assert_eq!(limiter.capacity(), 10);
        assert_eq!(limiter.available(), 10);
    }
}
