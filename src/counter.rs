//! Active-call counters.
//!
//! The dispatch layer owns increments and decrements; election only reads
//! [`CounterProvider::active`]. [`InMemoryCounters`] is a reference provider for
//! embedders that have no counter registry of their own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// Read-only seam onto per-(service, endpoint) in-flight counts.
pub trait CounterProvider: Send + Sync {
    fn active(&self, service: &str, endpoint_id: &str) -> u32;
}

/// Provider that reports zero for everything; election degrades to weighted random.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCounters;

impl CounterProvider for NoopCounters {
    fn active(&self, _service: &str, _endpoint_id: &str) -> u32 {
        0
    }
}

/// Single active-call counter, shared with the dispatch layer.
#[derive(Debug, Default)]
pub struct ActiveCounter {
    active: AtomicU32,
}

impl ActiveCounter {
    pub fn get(&self) -> u32 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn begin(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Never underflows; a stray `end` leaves the counter at zero.
    pub fn end(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }
}

type EndpointCounters = HashMap<String, Arc<ActiveCounter>>;

/// Counters keyed by service, then endpoint id. Lookups borrow both keys.
#[derive(Default)]
pub struct InMemoryCounters {
    counters: RwLock<HashMap<String, EndpointCounters>>,
}

impl InMemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, EndpointCounters>> {
        // counters are plain atomics, so a poisoned map is still accurate
        self.counters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the counter for the pair, creating it on first use.
    pub fn counter(&self, service: &str, endpoint_id: &str) -> Arc<ActiveCounter> {
        if let Some(counter) = self.read().get(service).and_then(|m| m.get(endpoint_id)) {
            return Arc::clone(counter);
        }
        let mut map = self
            .counters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let endpoints = map.entry(service.to_string()).or_default();
        Arc::clone(endpoints.entry(endpoint_id.to_string()).or_default())
    }

    pub fn len(&self) -> usize {
        self.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CounterProvider for InMemoryCounters {
    fn active(&self, service: &str, endpoint_id: &str) -> u32 {
        self.read()
            .get(service)
            .and_then(|endpoints| endpoints.get(endpoint_id))
            .map(|c| c.get())
            .unwrap_or(0)
    }
}
