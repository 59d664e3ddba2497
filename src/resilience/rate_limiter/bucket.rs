//! Smooth token-bucket arithmetic shared by both limiter modes.
//!
//! Permits accrue continuously at `1 / interval` per microsecond up to
//! `max_stored`. A reservation may borrow permits that have not accrued yet;
//! the debt moves `next_free_micros` forward and the caller waits it out.

use crate::policy::SlidingWindow;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct BucketState {
    stored_permits: f64,
    next_free_micros: u64,
}

#[derive(Debug)]
pub(crate) struct Bucket {
    window: SlidingWindow,
    interval_micros: f64,
    max_stored: f64,
    state: Mutex<BucketState>,
}

/// Point-in-time view of one window's bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSnapshot {
    pub permits: u32,
    pub window_ms: u64,
    pub stored_permits: f64,
    pub max_stored_permits: f64,
    /// Microseconds until the next reservation could be served.
    pub wait_micros: u64,
}

impl Bucket {
    /// `burst` stores up to the window's burst ceiling; otherwise nothing is ever stored.
    pub fn new(window: SlidingWindow, burst: bool, now_micros: u64) -> Self {
        let permits = window.permits.max(1) as f64;
        let window_micros = window.window().as_micros().max(1) as f64;
        let max_stored = if burst {
            window.burst_ceiling() as f64
        } else {
            0.0
        };
        Self {
            window,
            interval_micros: window_micros / permits,
            max_stored,
            state: Mutex::new(BucketState {
                stored_permits: max_stored,
                next_free_micros: now_micros,
            }),
        }
    }

    pub fn max_stored_permits(&self) -> f64 {
        self.max_stored
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // every update leaves the state consistent, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resync(&self, st: &mut BucketState, now_micros: u64) {
        if now_micros > st.next_free_micros {
            let accrued = (now_micros - st.next_free_micros) as f64 / self.interval_micros;
            st.stored_permits = (st.stored_permits + accrued).min(self.max_stored);
            st.next_free_micros = now_micros;
        }
    }

    fn can_acquire(st: &BucketState, now_micros: u64, timeout_micros: u64) -> bool {
        st.next_free_micros.saturating_sub(timeout_micros) <= now_micros
    }

    /// Charges `permits` and returns the moment the caller may proceed.
    fn reserve_earliest_available(&self, st: &mut BucketState, permits: u32, now_micros: u64) -> u64 {
        self.resync(st, now_micros);
        let moment = st.next_free_micros;
        let requested = permits as f64;
        let from_storage = requested.min(st.stored_permits);
        let fresh = requested - from_storage;
        let wait = (fresh * self.interval_micros).ceil() as u64;
        st.next_free_micros = st.next_free_micros.saturating_add(wait);
        st.stored_permits -= from_storage;
        moment
    }

    pub fn snapshot(&self, now_micros: u64) -> WindowSnapshot {
        let st = self.lock();
        let mut view = BucketState {
            stored_permits: st.stored_permits,
            next_free_micros: st.next_free_micros,
        };
        drop(st);
        self.resync(&mut view, now_micros);
        WindowSnapshot {
            permits: self.window.permits,
            window_ms: self.window.window_ms,
            stored_permits: view.stored_permits,
            max_stored_permits: self.max_stored,
            wait_micros: view.next_free_micros.saturating_sub(now_micros),
        }
    }
}

/// Conjunction of per-window buckets: a reservation charges every window or none.
#[derive(Debug)]
pub(crate) struct WindowGroup {
    buckets: Vec<Bucket>,
}

impl WindowGroup {
    pub fn new(windows: &[SlidingWindow], burst: bool, now_micros: u64) -> Self {
        Self {
            buckets: windows
                .iter()
                .map(|w| Bucket::new(w.clone(), burst, now_micros))
                .collect(),
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Returns the wait the caller must honour, or `None` when some window
    /// cannot serve the permits within `timeout_micros`.
    pub fn reserve(&self, permits: u32, now_micros: u64, timeout_micros: u64) -> Option<Duration> {
        if permits == 0 || self.buckets.is_empty() {
            return Some(Duration::ZERO);
        }
        // Buckets are always locked in declaration order.
        let mut guards: Vec<_> = self.buckets.iter().map(Bucket::lock).collect();
        if !guards
            .iter()
            .all(|st| Bucket::can_acquire(st, now_micros, timeout_micros))
        {
            return None;
        }
        let mut wait_micros = 0u64;
        for (bucket, st) in self.buckets.iter().zip(guards.iter_mut()) {
            let moment = bucket.reserve_earliest_available(st, permits, now_micros);
            wait_micros = wait_micros.max(moment.saturating_sub(now_micros));
        }
        Some(Duration::from_micros(wait_micros))
    }

    pub fn snapshot(&self, now_micros: u64) -> Vec<WindowSnapshot> {
        self.buckets.iter().map(|b| b.snapshot(now_micros)).collect()
    }
}
