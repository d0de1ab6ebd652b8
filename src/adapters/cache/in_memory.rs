//! In-process cache for development, tests and single-server deployments.
//!
//! Entries expire lazily on access, and a [`CacheSweeper`] removes the
//! ones nobody reads again. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::time;

use crate::domain::foundation::Timestamp;
use crate::ports::{CacheError, CacheProvider, Clock, SystemClock};

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Timestamp>,
}

impl CacheEntry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| !now.is_before(&at))
    }
}

/// Expiring map behind a single async mutex.
///
/// Every operation, including counter increments, runs inside one
/// critical section, so increments are atomic within the process.
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCache {
    /// Create a cache that reads time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Create a cache on the system clock.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Remove every expired entry, returning how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<Timestamp> {
        ttl.map(|ttl| self.clock.now().plus(ttl))
    }

    /// Read-modify-write of a numeric entry under the lock.
    async fn update_counter<N, P, F>(
        &self,
        key: &str,
        ttl: Duration,
        parse: P,
        add: F,
    ) -> Result<N, CacheError>
    where
        N: ToString + Copy,
        P: Fn(&str) -> Option<N>,
        F: Fn(Option<N>) -> N,
    {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        let live = entries.get(key).filter(|entry| !entry.is_expired(now));
        let (current, expires_at) = match live {
            Some(entry) => {
                let current = parse(&entry.value).ok_or_else(|| CacheError::Malformed {
                    key: key.to_string(),
                    reason: format!("'{}' is not a number", entry.value),
                })?;
                (Some(current), entry.expires_at)
            }
            None => (None, None),
        };

        let next = add(current);
        let expires_at = expires_at.or_else(|| Some(now.plus(ttl)));
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheProvider for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = self.expiry(ttl);
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64, ttl: Duration) -> Result<i64, CacheError> {
        self.update_counter(
            key,
            ttl,
            |raw| raw.parse::<i64>().ok(),
            |current| current.unwrap_or(0).saturating_add(by),
        )
        .await
    }

    async fn incr_float(&self, key: &str, by: f64, ttl: Duration) -> Result<f64, CacheError> {
        self.update_counter(
            key,
            ttl,
            |raw| raw.parse::<f64>().ok(),
            |current| current.unwrap_or(0.0) + by,
        )
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .and_then(|at| now.until(&at)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Background task that periodically evicts expired entries.
#[derive(Debug, Clone)]
pub struct CacheSweeper {
    cache: Arc<InMemoryCache>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: Arc<InMemoryCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Run sweeps until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Cache sweeper stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    let evicted = self.cache.sweep_expired().await;
                    if evicted > 0 {
                        tracing::debug!(evicted, "Swept expired cache entries");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;
    use crate::ports::CacheProviderExt;

    fn cache_with_clock() -> (Arc<InMemoryCache>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_unix_secs(1_705_312_800)));
        let cache = Arc::new(InMemoryCache::new(clock.clone()));
        (cache, clock)
    }

    // ─── Basic Operations ────────────────────────────────────────────

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let (cache, _) = cache_with_clock();
        assert_eq!(cache.get_raw("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let (cache, _) = cache_with_clock();
        cache.set_raw("k", "v".to_string(), None).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap(), Some("v".to_string()));
        assert!(cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn del_removes_key() {
        let (cache, _) = cache_with_clock();
        cache.set_raw("k", "v".to_string(), None).await.unwrap();
        cache.del("k").await.unwrap();
        assert!(!cache.exists("k").await.unwrap());
        // Deleting again is fine.
        cache.del("k").await.unwrap();
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (cache, _) = cache_with_clock();
        cache.set_raw("a", "1".to_string(), None).await.unwrap();
        cache.set_raw("b", "2".to_string(), None).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn typed_helpers_roundtrip_json() {
        let (cache, _) = cache_with_clock();
        cache.set("score", &vec![1, 2, 3], None).await;
        let value: Option<Vec<i32>> = cache.get("score").await;
        assert_eq!(value, Some(vec![1, 2, 3]));
        assert!(cache.contains("score").await);
    }

    #[tokio::test]
    async fn typed_get_treats_undecodable_value_as_miss() {
        let (cache, _) = cache_with_clock();
        cache.set_raw("k", "not json".to_string(), None).await.unwrap();
        let value: Option<Vec<i32>> = cache.get("k").await;
        assert_eq!(value, None);
    }

    // ─── Expiry ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn entry_expires_after_ttl_and_is_evicted_on_read() {
        let (cache, clock) = cache_with_clock();
        cache
            .set_raw("k", "v".to_string(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(59));
        assert!(cache.exists("k").await.unwrap());

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get_raw("k").await.unwrap(), None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn set_resets_ttl() {
        let (cache, clock) = cache_with_clock();
        let ttl = Some(Duration::from_secs(60));
        cache.set_raw("k", "a".to_string(), ttl).await.unwrap();
        clock.advance(Duration::from_secs(50));
        cache.set_raw("k", "b".to_string(), ttl).await.unwrap();
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.get_raw("k").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let (cache, clock) = cache_with_clock();
        cache
            .set_raw("short", "1".to_string(), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        cache
            .set_raw("long", "2".to_string(), Some(Duration::from_secs(1000)))
            .await
            .unwrap();
        cache.set_raw("forever", "3".to_string(), None).await.unwrap();

        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn ttl_reports_remaining_lifetime() {
        let (cache, clock) = cache_with_clock();
        cache
            .set_raw("k", "v".to_string(), Some(Duration::from_secs(100)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(30));

        assert_eq!(cache.ttl("k").await.unwrap(), Some(Duration::from_secs(70)));
        assert_eq!(cache.ttl("missing").await.unwrap(), None);
    }

    // ─── Counters ────────────────────────────────────────────────────

    #[tokio::test]
    async fn incr_starts_at_zero_and_counts() {
        let (cache, _) = cache_with_clock();
        let ttl = Duration::from_secs(3600);
        assert_eq!(cache.incr("c", 1, ttl).await.unwrap(), 1);
        assert_eq!(cache.incr("c", 1, ttl).await.unwrap(), 2);
        assert_eq!(cache.incr("c", 5, ttl).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn incr_does_not_extend_window() {
        let (cache, clock) = cache_with_clock();
        let ttl = Duration::from_secs(3600);
        cache.incr("c", 1, ttl).await.unwrap();

        clock.advance(Duration::from_secs(3000));
        cache.incr("c", 1, ttl).await.unwrap();
        assert_eq!(cache.ttl("c").await.unwrap(), Some(Duration::from_secs(600)));

        clock.advance(Duration::from_secs(600));
        assert_eq!(cache.incr("c", 1, ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn incr_rejects_non_numeric_value() {
        let (cache, _) = cache_with_clock();
        cache.set_raw("c", "abc".to_string(), None).await.unwrap();
        let err = cache.incr("c", 1, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CacheError::Malformed { .. }));
    }

    #[tokio::test]
    async fn incr_float_accumulates() {
        let (cache, _) = cache_with_clock();
        let ttl = Duration::from_secs(3600);
        cache.incr_float("cost", 0.25, ttl).await.unwrap();
        let total = cache.incr_float("cost", 0.5, ttl).await.unwrap();
        assert!((total - 0.75).abs() < f64::EPSILON);

        let stored: f64 = cache.get_raw("cost").await.unwrap().unwrap().parse().unwrap();
        assert!((stored - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let (cache, _) = cache_with_clock();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.incr("c", 1, Duration::from_secs(60)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.get_raw("c").await.unwrap(), Some("50".to_string()));
    }

    // ─── Sweeper ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let (cache, _) = cache_with_clock();
        let sweeper = CacheSweeper::new(cache, Duration::from_millis(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn sweeper_evicts_expired_entries() {
        let (cache, clock) = cache_with_clock();
        cache
            .set_raw("k", "v".to_string(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));

        let sweeper = CacheSweeper::new(cache.clone(), Duration::from_millis(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(cache.is_empty().await);
    }
}
