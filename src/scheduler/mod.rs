//! Job admission: validate, throttle, deduplicate, enqueue.
//!
//! The scheduler depends on three narrow capabilities - a lease store, a
//! throttle, and a queue producer - rather than concrete backends. The
//! throttle check runs before the dedup lease so an over-quota tenant never
//! consumes a dedup slot. On success the lease is left to expire naturally;
//! its TTL is the dedup window. On any failure after acquisition the lease
//! is released best-effort so the client may retry immediately.

pub mod job;

pub use job::{JobRequest, JobStatus, ScheduledJobEnvelope};

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lease::LeaseStore;
use crate::queue::JobQueue;
use crate::throttle::Throttle;

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Admission acknowledgement returned to the front door. Execution has not
/// started when this is produced.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub job_id: String,
    pub status: JobStatus,
    pub timeout_seconds: i32,
}

pub struct Scheduler {
    queue: Arc<dyn JobQueue>,
    leases: Arc<dyn LeaseStore>,
    throttle: Arc<dyn Throttle>,
    lock_ttl: Duration,
}

impl Scheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        leases: Arc<dyn LeaseStore>,
        throttle: Arc<dyn Throttle>,
        lock_ttl: Duration,
    ) -> Self {
        let lock_ttl = if lock_ttl.is_zero() {
            DEFAULT_LOCK_TTL
        } else {
            lock_ttl
        };
        Self {
            queue,
            leases,
            throttle,
            lock_ttl,
        }
    }

    /// Admits one job submission.
    ///
    /// Order of operations:
    /// 1. Validate the request
    /// 2. Check the throttle (fail fast if rate limited)
    /// 3. Acquire the dedup lease
    /// 4. Build and serialize the envelope
    /// 5. Enqueue keyed by organization id
    ///
    /// Either the job is durable in the queue and `PENDING` is returned, or
    /// no side effect outlives the lease TTL.
    pub async fn schedule_job(&self, request: JobRequest) -> Result<ScheduledJob> {
        request.validate()?;

        if !self.throttle.allow(&request.organization_id).await? {
            let remaining = self
                .throttle
                .remaining(&request.organization_id)
                .await
                .unwrap_or(0);
            return Err(Error::RateLimited {
                organization_id: request.organization_id,
                remaining,
            });
        }

        let lease_key = request.lease_key();
        let owner = Uuid::new_v4().to_string();
        if !self.leases.acquire(&lease_key, &owner, self.lock_ttl).await? {
            return Err(Error::DuplicateJob);
        }

        let envelope = ScheduledJobEnvelope::new(&request);
        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                self.release_lease(&lease_key, &owner).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self
            .queue
            .enqueue(request.organization_id.as_bytes(), &payload)
            .await
        {
            self.release_lease(&lease_key, &owner).await;
            return Err(err);
        }

        tracing::info!(
            job_id = %envelope.job_id,
            organization_id = %envelope.organization_id,
            job_type = %envelope.job_type,
            "Job scheduled"
        );

        Ok(ScheduledJob {
            job_id: envelope.job_id,
            status: JobStatus::Pending,
            timeout_seconds: request.timeout_seconds,
        })
    }

    /// Best-effort release after a post-acquire failure. A `LeaseNotOwned`
    /// answer means the TTL already expired; neither outcome overrides the
    /// original error.
    async fn release_lease(&self, key: &str, owner: &str) {
        if let Err(err) = self.leases.release(key, owner).await {
            tracing::warn!(key, error = %err, "Failed to release dedup lease");
        }
    }
}
