use super::bucket::WindowGroup;
use super::{RateLimiter, RateLimiterSnapshot, RejectReason};
use crate::clock::Clock;
use crate::policy::{LimiterMode, SlidingWindow};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Smooth token bucket: steady rate per window with up to one window of burst.
pub struct TokenBucketLimiter {
    windows: WindowGroup,
    clock: Arc<dyn Clock>,
}

impl TokenBucketLimiter {
    pub fn new(windows: &[SlidingWindow], clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_micros();
        Self {
            windows: WindowGroup::new(windows, true, now),
            clock,
        }
    }

    /// Burst ceiling of each window, in declaration order.
    pub fn max_stored_permits(&self) -> Vec<f64> {
        self.windows
            .buckets()
            .iter()
            .map(|b| b.max_stored_permits())
            .collect()
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn now_micros(&self) -> u64 {
        self.clock.now_micros()
    }

    fn acquire_at(
        &self,
        permits: u32,
        start_micros: u64,
        timeout_micros: u64,
    ) -> Result<Duration, RejectReason> {
        self.windows
            .reserve(permits, start_micros, timeout_micros)
            .ok_or_else(|| {
                debug!(permits, timeout_micros, "token bucket rejected acquire");
                RejectReason::Timeout
            })
    }

    fn snapshot(&self) -> RateLimiterSnapshot {
        let windows = self.windows.snapshot(self.clock.now_micros());
        RateLimiterSnapshot {
            mode: LimiterMode::TokenBucket,
            estimated_wait_ms: RateLimiterSnapshot::estimate_wait_ms(&windows),
            windows,
            in_flight: None,
            capacity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::resilience::rate_limiter::Admission;

    fn limiter(permits: u32, window: Duration) -> (TokenBucketLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = TokenBucketLimiter::new(
            &[SlidingWindow::new(permits, window)],
            Arc::new(clock.clone()),
        );
        (limiter, clock)
    }

    #[test]
    fn test_burst_then_steady_rate() {
        let (limiter, clock) = limiter(5, Duration::from_secs(1));
        assert_eq!(limiter.max_stored_permits(), vec![5.0]);
        for _ in 0..5 {
            assert!(limiter.try_acquire(1));
        }
        // one more is lent against the future
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));

        clock.advance(Duration::from_millis(200));
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
    }

    #[test]
    fn test_configured_burst_ceiling() {
        let clock = ManualClock::new();
        let window = SlidingWindow::new(4, Duration::from_secs(1));
        let limiter = TokenBucketLimiter::new(
            &[window.clone().with_max_burst(2), window.with_max_burst(8)],
            Arc::new(clock.clone()),
        );
        assert_eq!(limiter.max_stored_permits(), vec![2.0, 8.0]);

        // the smaller ceiling bounds the burst of the whole group
        let burst = (0..10).filter(|_| limiter.try_acquire(1)).count();
        assert_eq!(burst, 3);

        clock.advance(Duration::from_secs(10));
        let snap = limiter.snapshot();
        assert_eq!(snap.windows[0].stored_permits, 2.0);
        assert_eq!(snap.windows[1].stored_permits, 8.0);
    }

    #[test]
    fn test_acquire_at_reports_wait_within_timeout() {
        let (limiter, _clock) = limiter(10, Duration::from_secs(1));
        assert_eq!(limiter.acquire_at(11, 0, 0), Ok(Duration::ZERO));
        assert_eq!(limiter.acquire_at(1, 0, 50_000), Err(RejectReason::Timeout));
        assert_eq!(
            limiter.acquire_at(1, 0, 100_000),
            Ok(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_snapshot_reflects_debt() {
        let (limiter, clock) = limiter(10, Duration::from_secs(1));
        assert!(limiter.try_acquire(12));
        let snap = limiter.snapshot();
        assert_eq!(snap.mode, LimiterMode::TokenBucket);
        assert_eq!(snap.estimated_wait_ms, Some(200));
        assert!(snap.in_flight.is_none());

        clock.advance(Duration::from_millis(300));
        let snap = limiter.snapshot();
        assert_eq!(snap.estimated_wait_ms, None);
        assert!((snap.windows[0].stored_permits - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_acquire_waits_for_permit() {
        let (limiter, _clock) = limiter(1, Duration::from_millis(100));
        assert_eq!(
            limiter.acquire(2, Duration::from_secs(1)).await,
            Admission::Admitted
        );
        assert_eq!(
            limiter.acquire(1, Duration::from_secs(1)).await,
            Admission::AdmittedAfterWait {
                waited: Duration::from_millis(100)
            }
        );
        assert_eq!(
            limiter.acquire(1, Duration::from_millis(10)).await,
            Admission::Rejected(RejectReason::Timeout)
        );
    }
}
