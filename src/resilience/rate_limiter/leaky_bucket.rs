use super::bucket::WindowGroup;
use super::{micros_of, Admission, RateLimiter, RateLimiterSnapshot, RejectReason};
use crate::clock::Clock;
use crate::policy::{LimiterMode, SlidingWindow};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Leaky bucket: the configured rate with no burst, plus a cap on how many
/// callers may be inside [`RateLimiter::acquire`] at once.
///
/// The in-flight count rises on entry and falls when the call leaves, on
/// every path: admitted, rejected, or dropped while waiting.
pub struct LeakyBucketLimiter {
    windows: WindowGroup,
    clock: Arc<dyn Clock>,
    capacity: usize,
    in_flight: AtomicUsize,
}

/// Holds one in-flight slot until dropped.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> (Self, usize) {
        let now = counter.fetch_add(1, Ordering::AcqRel) + 1;
        (Self { counter }, now)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

impl LeakyBucketLimiter {
    /// A `capacity` of zero is treated as one.
    pub fn new(windows: &[SlidingWindow], capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_micros();
        Self {
            windows: WindowGroup::new(windows, false, now),
            clock,
            capacity: capacity.max(1),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Always zero: a leaky bucket never banks permits.
    pub fn max_stored_permits(&self) -> f64 {
        0.0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_over(&self) -> bool {
        self.in_flight() > self.capacity
    }

    fn reserve(
        &self,
        permits: u32,
        start_micros: u64,
        timeout_micros: u64,
    ) -> Result<Duration, RejectReason> {
        self.windows
            .reserve(permits, start_micros, timeout_micros)
            .ok_or_else(|| {
                debug!(permits, timeout_micros, "leaky bucket rejected acquire");
                RejectReason::Timeout
            })
    }
}

#[async_trait]
impl RateLimiter for LeakyBucketLimiter {
    fn now_micros(&self) -> u64 {
        self.clock.now_micros()
    }

    fn acquire_at(
        &self,
        permits: u32,
        start_micros: u64,
        timeout_micros: u64,
    ) -> Result<Duration, RejectReason> {
        let (_slot, in_flight) = InFlight::enter(&self.in_flight);
        if in_flight > self.capacity {
            debug!(in_flight, capacity = self.capacity, "leaky bucket over capacity");
            return Err(RejectReason::OverCapacity);
        }
        self.reserve(permits, start_micros, timeout_micros)
    }

    async fn acquire(&self, permits: u32, timeout: Duration) -> Admission {
        let (_slot, in_flight) = InFlight::enter(&self.in_flight);
        if in_flight > self.capacity {
            debug!(in_flight, capacity = self.capacity, "leaky bucket over capacity");
            return Admission::Rejected(RejectReason::OverCapacity);
        }
        match self.reserve(permits, self.clock.now_micros(), micros_of(timeout)) {
            Ok(wait) => {
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                    debug!(waited_ms = wait.as_millis() as u64, "admitted after wait");
                }
                Admission::from_wait(wait)
            }
            Err(reason) => Admission::Rejected(reason),
        }
    }

    fn is_full(&self) -> bool {
        self.in_flight() >= self.capacity
    }

    fn snapshot(&self) -> RateLimiterSnapshot {
        let windows = self.windows.snapshot(self.clock.now_micros());
        RateLimiterSnapshot {
            mode: LimiterMode::LeakyBucket,
            estimated_wait_ms: RateLimiterSnapshot::estimate_wait_ms(&windows),
            windows,
            in_flight: Some(self.in_flight()),
            capacity: Some(self.capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use futures::future::join_all;

    fn limiter(permits: u32, window: Duration, capacity: usize) -> LeakyBucketLimiter {
        LeakyBucketLimiter::new(
            &[SlidingWindow::new(permits, window)],
            capacity,
            Arc::new(ManualClock::new()),
        )
    }

    #[test]
    fn test_no_burst_allowed() {
        let limiter = limiter(100, Duration::from_secs(1), 10);
        assert_eq!(limiter.max_stored_permits(), 0.0);
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_full_and_over_guards() {
        let limiter = limiter(1, Duration::from_secs(1), 2);
        assert!(!limiter.is_full());
        let (_a, _) = InFlight::enter(&limiter.in_flight);
        let (_b, _) = InFlight::enter(&limiter.in_flight);
        assert!(limiter.is_full());
        assert!(!limiter.is_over());
        assert_eq!(limiter.acquire_at(1, 0, 0), Err(RejectReason::OverCapacity));
        let (_c, _) = InFlight::enter(&limiter.in_flight);
        assert!(limiter.is_over());
    }

    #[test]
    fn test_counter_released_on_every_sync_path() {
        let limiter = limiter(1, Duration::from_secs(1), 1);
        assert!(limiter.acquire_at(1, 0, 0).is_ok());
        assert_eq!(limiter.acquire_at(1, 0, 0), Err(RejectReason::Timeout));
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bounds_concurrent_waiters() {
        // one permit per 10s: everyone after the first has to queue
        let limiter = limiter(1, Duration::from_secs(10), 2);
        let attempts = (0..4).map(|_| limiter.acquire(1, Duration::from_secs(60)));
        let outcomes = join_all(attempts).await;

        assert_eq!(outcomes[0], Admission::Admitted);
        assert_eq!(
            outcomes[1],
            Admission::AdmittedAfterWait {
                waited: Duration::from_secs(10)
            }
        );
        assert_eq!(
            outcomes[2],
            Admission::AdmittedAfterWait {
                waited: Duration::from_secs(20)
            }
        );
        assert_eq!(outcomes[3], Admission::Rejected(RejectReason::OverCapacity));
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_releases_slot() {
        let limiter = limiter(1, Duration::from_secs(10), 1);
        assert!(limiter.try_acquire(1));

        let waiting = limiter.acquire(1, Duration::from_secs(60));
        let outcome = tokio::time::timeout(Duration::from_secs(1), waiting).await;
        assert!(outcome.is_err());
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_snapshot_reports_capacity() {
        let limiter = limiter(5, Duration::from_secs(1), 3);
        let snap = limiter.snapshot();
        assert_eq!(snap.mode, LimiterMode::LeakyBucket);
        assert_eq!(snap.capacity, Some(3));
        assert_eq!(snap.in_flight, Some(0));
        assert_eq!(snap.windows[0].max_stored_permits, 0.0);
    }
}
