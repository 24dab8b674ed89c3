//! Named dedup leases with owner-conditional release.
//!
//! A lease is a short-lived claim on a key, created by the scheduler to mark
//! an in-flight dedup window. Acquisition is atomic create-if-absent with a
//! TTL; release deletes the lease only if the caller still owns it. Backends
//! must provide both as single atomic operations (conditional set with
//! expiry, compare-and-delete) - no client-side locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Attempts to acquire the lease for `key` on behalf of `owner`.
    /// Returns true iff the caller now holds the lease; false means another
    /// owner holds an unexpired lease on the same key.
    async fn acquire(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool>;

    /// Deletes the lease iff its current owner equals `owner`, in a single
    /// atomic step. Returns `Error::LeaseNotOwned` when the owner differs or
    /// the key is absent; callers treat that as non-fatal.
    async fn release(&self, key: &str, owner: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct LeaseEntry {
    owner: String,
    expires_at: Instant,
}

/// In-memory lease store honoring the same contract as a conditional-set
/// backend. Expired entries behave as absent and are dropped on contact.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<String, LeaseEntry>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current live owner of `key`, if any.
    pub async fn holder(&self, key: &str) -> Option<String> {
        let leases = self.leases.lock().await;
        leases
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.owner.clone())
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn acquire(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        if let Some(entry) = leases.get(key) {
            if entry.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(
            key.to_string(),
            LeaseEntry {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, owner: &str) -> Result<()> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        match leases.get(key) {
            Some(entry) if entry.owner == owner && entry.expires_at > now => {
                leases.remove(key);
                Ok(())
            }
            _ => Err(Error::LeaseNotOwned {
                key: key.to_string(),
            }),
        }
    }
}
