use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

struct Entry<V> {
    cell: OnceCell<(Instant, V)>,
}

impl<V> Entry<V> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Entries still being resolved count as fresh so concurrent callers
    /// share the one resolution.
    fn is_fresh(&self, window: Duration) -> bool {
        match self.cell.get() {
            Some((resolved_at, _)) => resolved_at.elapsed() < window,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheState<V> {
    Missing,
    Pending,
    Ready(V),
}

/// Values keyed by string that are resolved once and reused until the
/// revalidation window passes. Failed resolutions are not kept.
pub struct RevalidatingCache<V> {
    window: Duration,
    entries: RwLock<HashMap<String, Arc<Entry<V>>>>,
}

impl<V: Clone> RevalidatingCache<V> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, key: &str) -> Arc<Entry<V>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key)
                && entry.is_fresh(self.window)
            {
                return entry.clone();
            }
        }

        let mut entries = self.entries.write().await;
        // Another task may have replaced it while we waited for the lock.
        if let Some(entry) = entries.get(key)
            && entry.is_fresh(self.window)
        {
            return entry.clone();
        }

        // Expired entries of other keys go too, so unseen keys cannot pile up.
        let window = self.window;
        entries.retain(|_, entry| entry.is_fresh(window));

        debug!("Creating cache entry for {}", key);
        let entry = Arc::new(Entry::new());
        entries.insert(key.to_string(), entry.clone());
        entry
    }

    pub async fn get_or_try_init<F, Fut, E>(&self, key: &str, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let entry = self.entry(key).await;

        let result = entry
            .cell
            .get_or_try_init(|| async move { init().await.map(|value| (Instant::now(), value)) })
            .await
            .map(|(_, value)| value.clone());

        if result.is_err() {
            let mut entries = self.entries.write().await;
            if let Some(current) = entries.get(key)
                && Arc::ptr_eq(current, &entry)
                && current.cell.get().is_none()
            {
                entries.remove(key);
            }
        }

        result
    }

    pub async fn state(&self, key: &str) -> CacheState<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            None => CacheState::Missing,
            Some(entry) => match entry.cell.get() {
                None => CacheState::Pending,
                Some((resolved_at, value)) if resolved_at.elapsed() < self.window => {
                    CacheState::Ready(value.clone())
                }
                Some(_) => CacheState::Missing,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_value_is_reused_within_window() {
        let cache = RevalidatingCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_try_init("key", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("key").await, CacheState::Ready(7));
    }

    #[tokio::test]
    async fn test_zero_window_always_revalidates() {
        let cache = RevalidatingCache::new(Duration::ZERO);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: Result<u32, ()> = cache
                .get_or_try_init("key", || async {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) as u32)
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache: RevalidatingCache<u32> = RevalidatingCache::new(Duration::from_secs(60));

        let failed: Result<u32, &str> = cache.get_or_try_init("key", || async { Err("down") }).await;
        assert_eq!(failed, Err("down"));
        assert_eq!(cache.state("key").await, CacheState::Missing);

        let recovered: Result<u32, &str> = cache.get_or_try_init("key", || async { Ok(3) }).await;
        assert_eq!(recovered, Ok(3));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_resolution() {
        let cache = Arc::new(RevalidatingCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Notify::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_init("slug", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok::<_, ()>("page")
                    })
                    .await
            }));
        }

        while cache.state("slug").await != CacheState::Pending {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("page"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let cache: RevalidatingCache<Option<u32>> = RevalidatingCache::new(Duration::ZERO);

        for i in 0..500 {
            let key = format!("missing-{}", i);
            let value: Result<Option<u32>, ()> =
                cache.get_or_try_init(&key, || async { Ok(None) }).await;
            assert_eq!(value, Ok(None));
        }

        assert!(cache.entries.read().await.len() <= 1);
    }

    #[tokio::test]
    async fn test_fresh_entries_survive_cleanup() {
        let cache = RevalidatingCache::new(Duration::from_secs(60));
        for key in ["a", "b", "c"] {
            let _: Result<u32, ()> = cache.get_or_try_init(key, || async { Ok(1) }).await;
        }

        assert_eq!(cache.entries.read().await.len(), 3);
        assert_eq!(cache.state("a").await, CacheState::Ready(1));
    }
}
