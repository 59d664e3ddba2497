use crate::clock::Clock;
use crate::resilience::rate_limiter::{LeakyBucketLimiter, RateLimiter, TokenBucketLimiter};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One rate window: at most `permits` per `window_ms`, spread evenly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindow {
    #[serde(alias = "threshold")]
    pub permits: u32,
    #[serde(alias = "time_window_in_ms")]
    pub window_ms: u64,
    /// Most permits an idle token bucket may store for a burst. `None` is one
    /// full window. Leaky buckets never store permits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_burst_permits: Option<u32>,
}

impl SlidingWindow {
    pub fn new(permits: u32, window: Duration) -> Self {
        Self {
            permits,
            window_ms: window.as_millis() as u64,
            max_burst_permits: None,
        }
    }

    pub fn with_max_burst(mut self, permits: u32) -> Self {
        self.max_burst_permits = Some(permits);
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Burst ceiling in token-bucket mode.
    pub fn burst_ceiling(&self) -> u32 {
        self.max_burst_permits.unwrap_or(self.permits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LimiterMode {
    #[default]
    TokenBucket,
    LeakyBucket,
}

/// Resolved rate-limit policy. Immutable once handed to a limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RateLimitPolicy {
    pub mode: LimiterMode,
    pub windows: Vec<SlidingWindow>,
    /// Maximum callers inside `acquire` at once (leaky bucket). `None` is unbounded.
    pub capacity: Option<usize>,
    /// Longest a call may wait for a permit before it is rejected.
    #[serde(rename = "max_wait_ms", with = "crate::utils::duration_ms")]
    pub max_wait: Duration,
}

impl RateLimitPolicy {
    pub fn new(mode: LimiterMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn token_bucket() -> Self {
        Self::new(LimiterMode::TokenBucket)
    }

    pub fn leaky_bucket(capacity: usize) -> Self {
        Self::new(LimiterMode::LeakyBucket).with_capacity(capacity)
    }

    pub fn with_window(self, permits: u32, window: Duration) -> Self {
        self.with_sliding_window(SlidingWindow::new(permits, window))
    }

    pub fn with_sliding_window(mut self, window: SlidingWindow) -> Self {
        self.windows.push(window);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            return Err(Error::validation_with_context(
                "rate limit policy needs at least one window",
                ErrorContext::new()
                    .with_field_path("rate_limit.windows")
                    .with_source("policy_validator"),
            ));
        }
        for (i, window) in self.windows.iter().enumerate() {
            if window.permits == 0 {
                return Err(Error::validation_with_context(
                    "window permits must be positive",
                    ErrorContext::new()
                        .with_field_path(format!("rate_limit.windows[{}].permits", i))
                        .with_source("policy_validator"),
                ));
            }
            if window.window_ms == 0 {
                return Err(Error::validation_with_context(
                    "window duration must be positive",
                    ErrorContext::new()
                        .with_field_path(format!("rate_limit.windows[{}].window_ms", i))
                        .with_source("policy_validator"),
                ));
            }
            if self.mode == LimiterMode::LeakyBucket && window.max_burst_permits.is_some() {
                return Err(Error::validation_with_context(
                    "leaky bucket windows cannot store burst permits",
                    ErrorContext::new()
                        .with_field_path(format!("rate_limit.windows[{}].max_burst_permits", i))
                        .with_details("remove the field or switch mode to token_bucket")
                        .with_source("policy_validator"),
                ));
            }
        }
        if self.capacity == Some(0) {
            return Err(Error::validation_with_context(
                "capacity must be positive when set",
                ErrorContext::new()
                    .with_field_path("rate_limit.capacity")
                    .with_details("omit the field for an unbounded capacity")
                    .with_source("policy_validator"),
            ));
        }
        Ok(())
    }

    /// Builds a fresh limiter; callers share the returned `Arc` across calls.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Arc<dyn RateLimiter> {
        match self.mode {
            LimiterMode::TokenBucket => Arc::new(TokenBucketLimiter::new(&self.windows, clock)),
            LimiterMode::LeakyBucket => Arc::new(LeakyBucketLimiter::new(
                &self.windows,
                self.capacity.unwrap_or(usize::MAX),
                clock,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_window_aliases() {
        let w: SlidingWindow =
            serde_yaml::from_str("threshold: 20\ntime_window_in_ms: 1000\n").unwrap();
        assert_eq!(w, SlidingWindow::new(20, Duration::from_secs(1)));
    }

    #[test]
    fn test_validate_rejects_bad_windows() {
        assert!(RateLimitPolicy::token_bucket().validate().is_err());

        let err = RateLimitPolicy::token_bucket()
            .with_window(10, Duration::from_secs(1))
            .with_window(0, Duration::from_secs(1))
            .validate()
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("rate_limit.windows[1].permits")
        );

        assert!(RateLimitPolicy::token_bucket()
            .with_window(10, Duration::ZERO)
            .validate()
            .is_err());
        assert!(RateLimitPolicy::leaky_bucket(0)
            .with_window(10, Duration::from_secs(1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_burst_ceiling_defaults_to_one_window() {
        let w: SlidingWindow =
            serde_yaml::from_str("permits: 20\nwindow_ms: 1000\nmax_burst_permits: 50\n").unwrap();
        assert_eq!(w.burst_ceiling(), 50);
        assert_eq!(SlidingWindow::new(20, Duration::from_secs(1)).burst_ceiling(), 20);
    }

    #[test]
    fn test_leaky_window_rejects_burst_setting() {
        let err = RateLimitPolicy::leaky_bucket(4)
            .with_sliding_window(SlidingWindow::new(10, Duration::from_secs(1)).with_max_burst(5))
            .validate()
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("rate_limit.windows[0].max_burst_permits")
        );

        assert!(RateLimitPolicy::token_bucket()
            .with_sliding_window(SlidingWindow::new(10, Duration::from_secs(1)).with_max_burst(0))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_build_selects_mode() {
        let clock = Arc::new(ManualClock::new());
        let leaky = RateLimitPolicy::leaky_bucket(4)
            .with_window(10, Duration::from_secs(1))
            .build(clock.clone());
        assert_eq!(leaky.snapshot().mode, LimiterMode::LeakyBucket);
        assert_eq!(leaky.snapshot().capacity, Some(4));

        let token = RateLimitPolicy::token_bucket()
            .with_window(10, Duration::from_secs(1))
            .build(clock);
        assert_eq!(token.snapshot().mode, LimiterMode::TokenBucket);
        assert!(!token.is_full());
    }
}
