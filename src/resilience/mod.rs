//! 弹性模式模块：提供调用准入的限流能力。
//!
//! # Admission Control
//!
//! Rate limiters gate an outbound call after an endpoint has been elected and
//! before any network I/O happens. A rejection here aborts the call.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter::TokenBucketLimiter`] | Steady rate with up to one window of burst |
//! | [`rate_limiter::LeakyBucketLimiter`] | Steady rate, no burst, bounded concurrent acquires |
//! | [`rate_limiter::Admission`] | Admitted, admitted after a wait, or rejected |
//!
//! Every limiter composes its policy's windows conjunctively: a call must be
//! admitted by all of them, and a rejected call charges none of them.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use traffic_governance::clock::ManualClock;
//! use traffic_governance::policy::SlidingWindow;
//! use traffic_governance::resilience::rate_limiter::{RateLimiter, TokenBucketLimiter};
//!
//! let limiter = TokenBucketLimiter::new(
//!     &[SlidingWindow::new(100, Duration::from_secs(1))],
//!     Arc::new(ManualClock::new()),
//! );
//! assert!(limiter.try_acquire(1));
//! ```

pub mod rate_limiter;

pub use rate_limiter::{Admission, RateLimiter, RateLimiterSnapshot, RejectReason};
