//! Atomic counters for runtime observability.
//!
//! All counters use relaxed ordering. They are diagnostic only and never
//! used for synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide operation counters for the formatting engine and the region
/// manager.
pub struct RuntimeMetrics {
    /// Formatting calls started.
    pub format_calls: AtomicU64,
    /// Formatting calls that returned an error.
    pub format_failures: AtomicU64,
    /// Bounded-sink calls whose output was cut short.
    pub truncations: AtomicU64,
    /// Growable-sink allocation failures.
    pub alloc_failures: AtomicU64,
    /// Successful `map` requests.
    pub maps: AtomicU64,
    /// Successful `unmap` requests.
    pub unmaps: AtomicU64,
    /// Rejected `map`/`unmap`/`protect` requests.
    pub map_failures: AtomicU64,
    /// Requests repaired in hardened mode.
    pub sanitized: AtomicU64,
}

impl RuntimeMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            format_calls: AtomicU64::new(0),
            format_failures: AtomicU64::new(0),
            truncations: AtomicU64::new(0),
            alloc_failures: AtomicU64::new(0),
            maps: AtomicU64::new(0),
            unmaps: AtomicU64::new(0),
            map_failures: AtomicU64::new(0),
            sanitized: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            format_calls: Self::get(&self.format_calls),
            format_failures: Self::get(&self.format_failures),
            truncations: Self::get(&self.truncations),
            alloc_failures: Self::get(&self.alloc_failures),
            maps: Self::get(&self.maps),
            unmaps: Self::get(&self.unmaps),
            map_failures: Self::get(&self.map_failures),
            sanitized: Self::get(&self.sanitized),
        }
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub format_calls: u64,
    pub format_failures: u64,
    pub truncations: u64,
    pub alloc_failures: u64,
    pub maps: u64,
    pub unmaps: u64,
    pub map_failures: u64,
    pub sanitized: u64,
}

static GLOBAL_METRICS: RuntimeMetrics = RuntimeMetrics::new();

/// Access the global metrics singleton.
#[must_use]
pub fn metrics() -> &'static RuntimeMetrics {
    &GLOBAL_METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = RuntimeMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn increment_works() {
        let m = RuntimeMetrics::new();
        RuntimeMetrics::inc(&m.maps);
        RuntimeMetrics::inc(&m.maps);
        RuntimeMetrics::inc(&m.truncations);
        let snap = m.snapshot();
        assert_eq!(snap.maps, 2);
        assert_eq!(snap.truncations, 1);
        assert_eq!(snap.unmaps, 0);
    }
}
