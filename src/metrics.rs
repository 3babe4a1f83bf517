use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks fetch and residency counters for the bundle loader
#[derive(Debug, Default)]
pub struct BundleMetrics {
    fetch_times: RwLock<HashMap<String, Duration>>,
    fetch_counts: RwLock<HashMap<String, u64>>,
    fetches_started: AtomicU64,
    dedup_hits: AtomicU64,
    fetch_failures: AtomicU64,
    bundles_released: AtomicU64,
}

impl BundleMetrics {
    /// Create a new instance of BundleMetrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a transport fetch was started for a bundle
    pub fn record_fetch_started(&self, name: &str) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
        let mut counts = self.fetch_counts.write();
        *counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Record a load request satisfied by a resident or pending bundle
    pub fn record_dedup_hit(&self) {
        self.dedup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the time from fetch start to residency
    pub fn record_fetch_time(&self, name: &str, duration: Duration) {
        self.fetch_times.write().insert(name.to_string(), duration);
    }

    pub fn record_release(&self) {
        self.bundles_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetches_started(&self) -> u64 {
        self.fetches_started.load(Ordering::Relaxed)
    }

    pub fn dedup_hits(&self) -> u64 {
        self.dedup_hits.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    pub fn bundles_released(&self) -> u64 {
        self.bundles_released.load(Ordering::Relaxed)
    }

    /// Share of load requests that did not need a new fetch, as a percentage
    pub fn dedup_hit_rate(&self) -> f32 {
        let hits = self.dedup_hits() as f32;
        let fetches = self.fetches_started() as f32;

        if hits + fetches > 0.0 {
            hits / (hits + fetches) * 100.0
        } else {
            0.0
        }
    }

    /// Get the most recent fetch time for a bundle
    pub fn fetch_time(&self, name: &str) -> Option<Duration> {
        self.fetch_times.read().get(name).cloned()
    }

    /// Get the number of fetches started for a bundle
    pub fn fetch_count(&self, name: &str) -> u64 {
        *self.fetch_counts.read().get(name).unwrap_or(&0)
    }

    /// Get all recorded fetch times
    pub fn all_fetch_times(&self) -> HashMap<String, Duration> {
        self.fetch_times.read().clone()
    }
}

/// A thread-safe wrapper around BundleMetrics
#[derive(Debug, Clone, Default)]
pub struct BundleMetricsHandle(Arc<BundleMetrics>);

impl BundleMetricsHandle {
    /// Create a new metrics handle
    pub fn new() -> Self {
        Self(Arc::new(BundleMetrics::new()))
    }

    /// Get a reference to the underlying metrics
    pub fn inner(&self) -> &BundleMetrics {
        &self.0
    }
}

impl std::ops::Deref for BundleMetricsHandle {
    type Target = BundleMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_hit_rate() {
        let metrics = BundleMetrics::new();
        assert_eq!(metrics.dedup_hit_rate(), 0.0);

        metrics.record_fetch_started("a");
        metrics.record_dedup_hit();
        assert_eq!(metrics.dedup_hit_rate(), 50.0);
        assert_eq!(metrics.fetch_count("a"), 1);
        assert_eq!(metrics.fetch_count("b"), 0);
    }

    #[test]
    fn test_handle_shares_counters() {
        let handle = BundleMetricsHandle::new();
        let clone = handle.clone();
        clone.record_release();
        clone.record_fetch_time("a", Duration::from_millis(5));

        assert_eq!(handle.bundles_released(), 1);
        assert_eq!(handle.fetch_time("a"), Some(Duration::from_millis(5)));
        assert_eq!(handle.all_fetch_times().len(), 1);
    }
}
