//! Time-bounded in-process cache of fetched page content, keyed by URL.

use bytes::Bytes;
use moka::future::Cache;
use std::future::Future;
use std::time::Duration;

/// Marker for an `init` that produced nothing; never stored.
#[derive(Debug)]
struct Unavailable;

/// Bounded, expiring URL → raw content cache.
///
/// Entries expire `ttl` after insertion; when `max_entries` is exceeded the
/// cache evicts according to moka's TinyLFU policy. Cloning is cheap and
/// shares the same storage.
#[derive(Clone, Debug)]
pub struct ContentCache {
    inner: Cache<String, Bytes>,
}

impl ContentCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let inner = Cache::builder().max_capacity(max_entries).time_to_live(ttl).build();
        Self { inner }
    }

    pub async fn get(&self, url: &str) -> Option<Bytes> {
        self.inner.get(url).await
    }

    pub async fn insert(&self, url: &str, content: Bytes) {
        self.inner.insert(url.to_string(), content).await;
    }

    /// Cached content for `url`, or whatever `init` produces.
    ///
    /// Concurrent callers for the same missing URL share a single `init`.
    /// A `None` from `init` is handed to every waiter but not cached, so the
    /// next call tries again.
    pub async fn get_or_fetch<F>(&self, url: &str, init: F) -> Option<Bytes>
    where
        F: Future<Output = Option<Bytes>>,
    {
        self.inner
            .try_get_with(url.to_string(), async { init.await.ok_or(Unavailable) })
            .await
            .ok()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.contains_key(url)
    }

    /// Approximate entry count after flushing pending maintenance.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl Default for ContentCache {
    /// 100 entries, one hour.
    fn default() -> Self {
        Self::new(100, Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ContentCache::default();
        cache.insert("https://example.com/", Bytes::from_static(b"<html></html>")).await;

        assert_eq!(cache.get("https://example.com/").await, Some(Bytes::from_static(b"<html></html>")));
        assert!(cache.contains("https://example.com/"));
        assert!(cache.get("https://other.com/").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = ContentCache::default();
        let clone = cache.clone();
        clone.insert("https://example.com/a", Bytes::from_static(b"a")).await;
        assert!(cache.get("https://example.com/a").await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = ContentCache::new(5, Duration::from_secs(3600));
        for i in 0..50 {
            cache.insert(&format!("https://example.com/{i}"), Bytes::from(vec![b'x'; 10])).await;
        }
        assert!(cache.len().await <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_shares_one_load() {
        let cache = ContentCache::default();
        let loads = AtomicUsize::new(0);
        let counter = &loads;
        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Some(Bytes::from_static(b"page"))
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("https://example.com/", load()),
            cache.get_or_fetch("https://example.com/", load()),
        );

        assert_eq!(a.as_deref(), Some(&b"page"[..]));
        assert_eq!(b.as_deref(), Some(&b"page"[..]));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_does_not_cache_misses() {
        let cache = ContentCache::default();

        assert!(cache.get_or_fetch("https://example.com/", async { None }).await.is_none());
        assert!(!cache.contains("https://example.com/"));

        let again = cache
            .get_or_fetch("https://example.com/", async { Some(Bytes::from_static(b"late")) })
            .await;
        assert_eq!(again.as_deref(), Some(&b"late"[..]));
    }
}
