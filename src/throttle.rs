//! Per-tenant sliding-window admission control.
//!
//! Two independent windows per tenant (one minute, one hour) with separate
//! caps. An admission prunes stale events, checks both caps, and records the
//! event in both windows only when admitted; a denied request is never
//! recorded. The check and the record are close in time but deliberately not
//! fused into one transaction: two concurrent admissions at the cap boundary
//! may both pass. This is a fairness heuristic, not a safety property.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub const HOUR_WINDOW: Duration = Duration::from_secs(3_600);

#[async_trait]
pub trait Throttle: Send + Sync {
    /// Returns true iff the organization is within both of its windows.
    /// Admission records the event; denial records nothing.
    async fn allow(&self, organization_id: &str) -> Result<bool>;

    /// Requests left in the current minute window, floored at zero.
    async fn remaining(&self, organization_id: &str) -> Result<i64>;
}

fn minute_key(organization_id: &str) -> String {
    format!("throttle:{organization_id}:minute")
}

fn hour_key(organization_id: &str) -> String {
    format!("throttle:{organization_id}:hour")
}

/// Ordered set of event timestamps (nanoseconds from the throttle epoch)
/// plus the key's own expiry, mirroring a sorted-set-with-TTL backend.
#[derive(Debug)]
struct WindowSet {
    events: VecDeque<u128>,
    expires_at: Instant,
}

/// In-memory sliding-window throttle keyed by the same per-tenant window
/// keys a sorted-set backend would use.
#[derive(Debug)]
pub struct MemoryThrottle {
    limit_per_minute: i64,
    limit_per_hour: i64,
    minute_window: Duration,
    hour_window: Duration,
    epoch: Instant,
    windows: Mutex<HashMap<String, WindowSet>>,
}

impl MemoryThrottle {
    pub fn new(limit_per_minute: i64, limit_per_hour: i64) -> Self {
        Self::with_windows(limit_per_minute, limit_per_hour, MINUTE_WINDOW, HOUR_WINDOW)
    }

    /// Construction with explicit window lengths, for tests that cannot wait
    /// out a real minute.
    pub fn with_windows(
        limit_per_minute: i64,
        limit_per_hour: i64,
        minute_window: Duration,
        hour_window: Duration,
    ) -> Self {
        Self {
            limit_per_minute,
            limit_per_hour,
            minute_window,
            hour_window,
            epoch: Instant::now(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tenant window keys currently tracked (for tests).
    pub async fn tracked_windows(&self) -> usize {
        self.windows.lock().await.len()
    }

    fn now_nanos(&self) -> u128 {
        self.epoch.elapsed().as_nanos()
    }

    /// Window keys outlive the window itself by a sixth so a tenant going
    /// quiet right at the cap still counts correctly, then gets swept.
    fn expiry_slack(window: Duration) -> Duration {
        window + window / 6
    }

    /// Drops events older than `now - window` and returns the count left.
    fn prune_and_count(set: &mut WindowSet, now_nanos: u128, window: Duration) -> i64 {
        let cutoff = now_nanos.saturating_sub(window.as_nanos());
        while let Some(oldest) = set.events.front() {
            if *oldest < cutoff {
                set.events.pop_front();
            } else {
                break;
            }
        }
        set.events.len() as i64
    }
}

#[async_trait]
impl Throttle for MemoryThrottle {
    async fn allow(&self, organization_id: &str) -> Result<bool> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let now_nanos = self.now_nanos();

        // Sweep expired keys so idle tenants do not accumulate.
        windows.retain(|_, set| set.expires_at > now);

        let minute = windows
            .entry(minute_key(organization_id))
            .or_insert_with(|| WindowSet {
                events: VecDeque::new(),
                expires_at: now + Self::expiry_slack(self.minute_window),
            });
        if Self::prune_and_count(minute, now_nanos, self.minute_window) >= self.limit_per_minute {
            return Ok(false);
        }

        let hour = windows
            .entry(hour_key(organization_id))
            .or_insert_with(|| WindowSet {
                events: VecDeque::new(),
                expires_at: now + Self::expiry_slack(self.hour_window),
            });
        if Self::prune_and_count(hour, now_nanos, self.hour_window) >= self.limit_per_hour {
            return Ok(false);
        }

        hour.events.push_back(now_nanos);
        hour.expires_at = now + Self::expiry_slack(self.hour_window);

        // Both checks passed; record in the minute window as well.
        if let Some(minute) = windows.get_mut(&minute_key(organization_id)) {
            minute.events.push_back(now_nanos);
            minute.expires_at = now + Self::expiry_slack(self.minute_window);
        }

        Ok(true)
    }

    async fn remaining(&self, organization_id: &str) -> Result<i64> {
        let mut windows = self.windows.lock().await;
        let now_nanos = self.now_nanos();

        let count = match windows.get_mut(&minute_key(organization_id)) {
            Some(minute) => Self::prune_and_count(minute, now_nanos, self.minute_window),
            None => 0,
        };

        Ok((self.limit_per_minute - count).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_minute_limit() {
        let throttle = MemoryThrottle::new(3, 100);

        for _ in 0..3 {
            assert!(throttle.allow("org-a").await.unwrap());
        }
        assert!(!throttle.allow("org-a").await.unwrap());
        assert_eq!(throttle.remaining("org-a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tenants_have_independent_windows() {
        let throttle = MemoryThrottle::new(1, 100);

        assert!(throttle.allow("org-a").await.unwrap());
        assert!(!throttle.allow("org-a").await.unwrap());
        assert!(throttle.allow("org-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let throttle = MemoryThrottle::new(5, 100);

        assert_eq!(throttle.remaining("org-a").await.unwrap(), 5);
        throttle.allow("org-a").await.unwrap();
        throttle.allow("org-a").await.unwrap();
        assert_eq!(throttle.remaining("org-a").await.unwrap(), 3);
    }
}
