//! Rate limiter admission, including concurrent leaky-bucket callers.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use traffic_governance::clock::ManualClock;
use traffic_governance::policy::SlidingWindow;
use traffic_governance::resilience::rate_limiter::{LeakyBucketLimiter, TokenBucketLimiter};
use traffic_governance::{Admission, RateLimitPolicy, RateLimiter, RejectReason};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn test_leaky_capacity_bound_and_release() {
    init_tracing();
    let capacity = 3;
    let limiter = Arc::new(LeakyBucketLimiter::new(
        &[SlidingWindow::new(1, Duration::from_secs(1))],
        capacity,
        Arc::new(ManualClock::new()),
    ));

    let attempts: Vec<_> = (0..capacity + 3)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire(1, Duration::from_secs(30)).await })
        })
        .collect();

    let outcomes: Vec<Admission> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(outcomes
        .iter()
        .any(|o| *o == Admission::Rejected(RejectReason::OverCapacity)));
    assert!(outcomes.iter().filter(|o| o.is_admitted()).count() >= capacity);
    assert_eq!(limiter.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_rejections_release_in_flight() {
    let limiter = LeakyBucketLimiter::new(
        &[SlidingWindow::new(1, Duration::from_secs(10))],
        8,
        Arc::new(ManualClock::new()),
    );
    let outcomes = join_all((0..4).map(|_| limiter.acquire(1, Duration::from_secs(5)))).await;

    assert_eq!(outcomes[0], Admission::Admitted);
    assert!(outcomes[1..]
        .iter()
        .all(|o| *o == Admission::Rejected(RejectReason::Timeout)));
    assert_eq!(limiter.in_flight(), 0);
}

#[test]
fn test_windows_compose_conjunctively() {
    let clock = ManualClock::new();
    let limiter = TokenBucketLimiter::new(
        &[
            SlidingWindow::new(10, Duration::from_secs(1)),
            SlidingWindow::new(2, Duration::from_secs(60)),
        ],
        Arc::new(clock.clone()),
    );

    assert!(limiter.try_acquire(1));
    assert!(limiter.try_acquire(1));
    // the third borrows against the per-minute window, the fourth cannot
    assert!(limiter.try_acquire(1));
    assert!(!limiter.try_acquire(1));

    clock.advance(Duration::from_secs(2));
    assert!(!limiter.try_acquire(1));
}

#[test]
fn test_token_bucket_refills_over_time() {
    let clock = ManualClock::new();
    let limiter = RateLimitPolicy::token_bucket()
        .with_window(5, Duration::from_secs(1))
        .build(Arc::new(clock.clone()));

    // five stored permits plus one borrowed from the next interval
    let burst = (0..10).filter(|_| limiter.try_acquire(1)).count();
    assert_eq!(burst, 6);

    clock.advance(Duration::from_millis(400));
    assert!(limiter.try_acquire(1));
    assert!(limiter.try_acquire(1));
    assert!(!limiter.try_acquire(1));
}

#[tokio::test(start_paused = true)]
async fn test_blocking_acquire_reports_wait() {
    let limiter = RateLimitPolicy::leaky_bucket(4)
        .with_window(2, Duration::from_secs(1))
        .build(Arc::new(ManualClock::new()));

    assert_eq!(limiter.acquire(1, Duration::from_secs(1)).await, Admission::Admitted);
    assert_eq!(
        limiter.acquire(1, Duration::from_secs(1)).await,
        Admission::AdmittedAfterWait {
            waited: Duration::from_millis(500)
        }
    );
    let snapshot = limiter.snapshot();
    assert_eq!(snapshot.in_flight, Some(0));
}
