use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use steep_core::ServiceId;

/// Per-service retry counts, observable as a gauge metric (§4.4 step 4,
/// §5 "Retry counter gauge — per-service, monotonically increasing; atomic
/// increments").
#[derive(Default)]
pub struct RetryCounters {
    counts: DashMap<ServiceId, AtomicU64>,
}

impl RetryCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, service: ServiceId) -> u64 {
        self.counts
            .entry(service)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    #[must_use]
    pub fn get(&self, service: ServiceId) -> u64 {
        self.counts
            .get(&service)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }
}
