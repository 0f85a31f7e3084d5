//! Shared detection cache.
//!
//! A concurrent map from normalized absolute path to the most recent
//! [`Detection`] for that path, fed by the background log tailers and
//! consumed by the scan orchestrator. Entries are evicted by a background
//! sweeper once they exceed the TTL; in steady state the map is bounded by
//! inflight scans plus recent RTS events.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::Detection;

/// Default time-to-live for cached detections.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default sweep cadence: half the TTL.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Thread-safe cache of RTS detections keyed by normalized absolute path.
#[derive(Debug)]
pub struct DetectionCache {
    detections: RwLock<HashMap<String, Detection>>,
    ttl: Duration,
    cancel: CancellationToken,
}

impl DetectionCache {
    /// Creates a cache with the given TTL and sweep interval, and spawns
    /// the background sweeper. Must be called from within a tokio runtime.
    pub fn new(ttl: Duration, cleanup_interval: Duration) -> Arc<Self> {
        let cache = Arc::new(Self {
            detections: RwLock::new(HashMap::new()),
            ttl,
            cancel: CancellationToken::new(),
        });
        tokio::spawn(sweep_loop(
            Arc::downgrade(&cache),
            cleanup_interval,
            cache.cancel.clone(),
        ));
        cache
    }

    /// Creates a cache with the default TTL (60 s) and sweep interval (30 s).
    pub fn with_defaults() -> Arc<Self> {
        Self::new(DEFAULT_TTL, DEFAULT_CLEANUP_INTERVAL)
    }

    /// Stores a detection, overwriting any existing entry for the same
    /// path. The detection's `created_at` is restamped at insertion.
    pub fn put(&self, path: impl Into<String>, mut detection: Detection) {
        detection.created_at = Instant::now();
        self.detections.write().insert(path.into(), detection);
    }

    /// Atomically removes and returns the entry for `path`, if present.
    ///
    /// At most one of any number of concurrent callers observes a given
    /// entry. Reusing a path for a second request within the TTL is
    /// therefore undefined; file-ID uniqueness prevents it in practice.
    pub fn take(&self, path: &str) -> Option<Detection> {
        self.detections.write().remove(path)
    }

    /// Returns a copy of the entry for `path` without removing it.
    pub fn peek(&self, path: &str) -> Option<Detection> {
        self.detections.read().get(path).cloned()
    }

    /// Number of cached detections.
    pub fn len(&self) -> usize {
        self.detections.read().len()
    }

    /// Returns `true` when no detections are cached.
    pub fn is_empty(&self) -> bool {
        self.detections.read().is_empty()
    }

    /// Stops the background sweeper. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn sweep(&self) {
        let now = Instant::now();
        let mut map = self.detections.write();
        map.retain(|_, detection| now.duration_since(detection.created_at) <= self.ttl);
    }
}

async fn sweep_loop(cache: Weak<DetectionCache>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; nothing can have expired yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else { return };
                cache.sweep();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;

    fn detection(path: &str) -> Detection {
        Detection::infected(path, "Test.Signature", format!("{path}: Test.Signature FOUND"))
    }

    #[tokio::test]
    async fn put_then_peek_and_take() {
        let cache = DetectionCache::with_defaults();
        cache.put("/tmp/a.bin", detection("/tmp/a.bin"));

        let peeked = cache.peek("/tmp/a.bin").unwrap();
        assert_eq!(peeked.signature, "Test.Signature");
        assert_eq!(peeked.verdict, Verdict::Infected);

        let taken = cache.take("/tmp/a.bin").unwrap();
        assert_eq!(taken.signature, "Test.Signature");
        assert!(cache.take("/tmp/a.bin").is_none());
        assert!(cache.peek("/tmp/a.bin").is_none());

        cache.stop();
    }

    #[tokio::test]
    async fn put_overwrites_existing_entry() {
        let cache = DetectionCache::with_defaults();
        cache.put("/tmp/a.bin", Detection::infected("/tmp/a.bin", "First", "l1"));
        cache.put("/tmp/a.bin", Detection::infected("/tmp/a.bin", "Second", "l2"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take("/tmp/a.bin").unwrap().signature, "Second");
        cache.stop();
    }

    #[tokio::test]
    async fn sweeper_evicts_expired_entries() {
        let cache = DetectionCache::new(Duration::from_millis(50), Duration::from_millis(25));
        cache.put("/tmp/old.bin", detection("/tmp/old.bin"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.peek("/tmp/old.bin").is_none());
        assert!(cache.is_empty());
        cache.stop();
    }

    #[tokio::test]
    async fn fresh_entries_survive_sweep() {
        let cache = DetectionCache::new(Duration::from_secs(60), Duration::from_millis(20));
        cache.put("/tmp/fresh.bin", detection("/tmp/fresh.bin"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.peek("/tmp/fresh.bin").is_some());
        cache.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_takes_observe_entry_at_most_once() {
        let cache = DetectionCache::with_defaults();
        cache.put("/tmp/contended.bin", detection("/tmp/contended.bin"));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.take("/tmp/contended.bin").is_some()
            }));
        }

        let mut hits = 0;
        for handle in handles {
            if handle.await.unwrap() {
                hits += 1;
            }
        }
        assert_eq!(hits, 1);
        cache.stop();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let cache = DetectionCache::with_defaults();
        cache.stop();
        cache.stop();
    }
}
