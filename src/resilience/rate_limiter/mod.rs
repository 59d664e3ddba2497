//! Admission control over one or more sliding windows.
//!
//! Both limiters share the smooth token-bucket arithmetic in `bucket`.
//! [`TokenBucketLimiter`] lets up to one window of permits accumulate as
//! burst; [`LeakyBucketLimiter`] stores nothing and additionally caps how
//! many callers may be inside `acquire` at once.

mod bucket;
mod leaky_bucket;
mod token_bucket;

pub use bucket::WindowSnapshot;
pub use leaky_bucket::LeakyBucketLimiter;
pub use token_bucket::TokenBucketLimiter;

use crate::policy::LimiterMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why an acquire attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Too many callers already inside `acquire` (leaky bucket only).
    OverCapacity,
    /// No permit would become available before the timeout.
    Timeout,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OverCapacity => f.write_str("too many in-flight acquires"),
            RejectReason::Timeout => f.write_str("no permit available within timeout"),
        }
    }
}

/// Outcome of an acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    AdmittedAfterWait { waited: Duration },
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected(_))
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Admission::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn from_wait(wait: Duration) -> Self {
        if wait.is_zero() {
            Admission::Admitted
        } else {
            Admission::AdmittedAfterWait { waited: wait }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterSnapshot {
    pub mode: LimiterMode,
    pub windows: Vec<WindowSnapshot>,
    /// Callers currently inside `acquire` (leaky bucket only).
    pub in_flight: Option<usize>,
    pub capacity: Option<usize>,
    /// Estimated wait for a single permit right now, if any.
    pub estimated_wait_ms: Option<u64>,
}

impl RateLimiterSnapshot {
    pub(crate) fn estimate_wait_ms(windows: &[WindowSnapshot]) -> Option<u64> {
        windows
            .iter()
            .map(|w| w.wait_micros)
            .max()
            .filter(|&micros| micros > 0)
            .map(|micros| micros.div_ceil(1_000))
    }
}

pub(crate) fn micros_of(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// Rate limiter shared by all calls to one endpoint or path.
///
/// No fairness is promised between waiting callers: whoever reserves first
/// is served first, regardless of arrival order.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Current time on the limiter's clock, in microseconds.
    fn now_micros(&self) -> u64;

    /// Decides at `start_micros` without sleeping. `Ok` carries the wait the
    /// caller must honour before proceeding; permits are already charged.
    fn acquire_at(
        &self,
        permits: u32,
        start_micros: u64,
        timeout_micros: u64,
    ) -> Result<Duration, RejectReason>;

    /// Admits only when permits are available right now.
    fn try_acquire(&self, permits: u32) -> bool {
        matches!(self.acquire_at(permits, self.now_micros(), 0), Ok(wait) if wait.is_zero())
    }

    /// Admits, waits up to `timeout` and admits, or rejects.
    async fn acquire(&self, permits: u32, timeout: Duration) -> Admission {
        match self.acquire_at(permits, self.now_micros(), micros_of(timeout)) {
            Ok(wait) => {
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                Admission::from_wait(wait)
            }
            Err(reason) => Admission::Rejected(reason),
        }
    }

    /// At or above the concurrent-acquire capacity. Always false without a capacity.
    fn is_full(&self) -> bool {
        false
    }

    fn snapshot(&self) -> RateLimiterSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_helpers() {
        assert!(Admission::Admitted.is_admitted());
        assert!(Admission::AdmittedAfterWait {
            waited: Duration::from_millis(5)
        }
        .is_admitted());
        let rejected = Admission::Rejected(RejectReason::Timeout);
        assert!(!rejected.is_admitted());
        assert_eq!(rejected.reject_reason(), Some(RejectReason::Timeout));
        assert_eq!(Admission::from_wait(Duration::ZERO), Admission::Admitted);
    }

    #[test]
    fn test_estimate_wait_rounds_up_to_millis() {
        let window = |wait_micros| WindowSnapshot {
            permits: 1,
            window_ms: 1_000,
            stored_permits: 0.0,
            max_stored_permits: 0.0,
            wait_micros,
        };
        assert_eq!(RateLimiterSnapshot::estimate_wait_ms(&[window(0)]), None);
        assert_eq!(
            RateLimiterSnapshot::estimate_wait_ms(&[window(1_500), window(200)]),
            Some(2)
        );
    }

    #[test]
    fn test_micros_of_saturates() {
        assert_eq!(micros_of(Duration::MAX), u64::MAX);
        assert_eq!(micros_of(Duration::from_millis(3)), 3_000);
    }
}
