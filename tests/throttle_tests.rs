//! Sliding-window throttle tests, including the concurrency band at the cap.

use std::sync::Arc;
use std::time::Duration;

use mcp_control_plane::throttle::{MemoryThrottle, Throttle};

#[tokio::test]
async fn test_minute_cap_is_enforced() {
    let throttle = MemoryThrottle::new(3, 1_000);

    for _ in 0..3 {
        assert!(throttle.allow("org-a").await.unwrap());
    }
    assert!(!throttle.allow("org-a").await.unwrap());
    assert_eq!(throttle.remaining("org-a").await.unwrap(), 0);
}

#[tokio::test]
async fn test_denied_requests_are_not_recorded() {
    // Minute cap 1, hour cap 2, with short windows. If denials were
    // recorded in the hour window, the fourth admission below would be
    // denied by the hour cap.
    let throttle = MemoryThrottle::with_windows(
        1,
        2,
        Duration::from_millis(100),
        Duration::from_secs(10),
    );

    assert!(throttle.allow("org-a").await.unwrap());
    assert!(!throttle.allow("org-a").await.unwrap());
    assert!(!throttle.allow("org-a").await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Minute window has slid; hour window holds one recorded event.
    assert!(throttle.allow("org-a").await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Hour window now holds two events and is at its cap.
    assert!(!throttle.allow("org-a").await.unwrap());
}

#[tokio::test]
async fn test_window_slides_rather_than_resets() {
    let throttle =
        MemoryThrottle::with_windows(2, 100, Duration::from_millis(200), Duration::from_secs(10));

    assert!(throttle.allow("org-a").await.unwrap());
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(throttle.allow("org-a").await.unwrap());
    assert!(!throttle.allow("org-a").await.unwrap());

    // The first event ages out; one slot opens while the second remains.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(throttle.allow("org-a").await.unwrap());
    assert!(!throttle.allow("org-a").await.unwrap());
}

#[tokio::test]
async fn test_remaining_never_goes_negative() {
    let throttle = MemoryThrottle::new(2, 1_000);

    assert_eq!(throttle.remaining("org-a").await.unwrap(), 2);
    throttle.allow("org-a").await.unwrap();
    throttle.allow("org-a").await.unwrap();
    throttle.allow("org-a").await.unwrap();
    assert_eq!(throttle.remaining("org-a").await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_admissions_within_cap_all_pass() {
    let throttle = Arc::new(MemoryThrottle::new(10, 1_000));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move { throttle.allow("org-a").await.unwrap() })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn test_concurrent_admissions_over_cap_stay_in_band() {
    let limit = 5;
    let concurrency = 12;
    let throttle = Arc::new(MemoryThrottle::new(limit, 1_000));

    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move { throttle.allow("org-a").await.unwrap() })
        })
        .collect();

    let mut admitted = 0i64;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    // At least the cap is admitted; the soft-limit race band never exceeds
    // cap + concurrency.
    assert!(admitted >= limit, "admitted {admitted} < limit {limit}");
    assert!(admitted <= limit + concurrency);
}

#[tokio::test]
async fn test_idle_tenant_windows_are_swept() {
    let throttle = MemoryThrottle::with_windows(
        10,
        100,
        Duration::from_millis(50),
        Duration::from_millis(100),
    );

    throttle.allow("org-a").await.unwrap();
    throttle.allow("org-b").await.unwrap();
    assert!(throttle.tracked_windows().await > 0);

    // Wait out the longest window plus its expiry slack, then touch a new
    // tenant to trigger the sweep.
    tokio::time::sleep(Duration::from_millis(250)).await;
    throttle.allow("org-c").await.unwrap();

    // Only org-c's two windows remain.
    assert_eq!(throttle.tracked_windows().await, 2);
}
