//! In-memory partitioned log with consumer-group offset tracking.
//!
//! Stands in for the real broker in tests and single-process deployments
//! while keeping its semantics: hash partitioning by key, append-only
//! per-partition logs, committed offsets per (group, partition), and
//! redelivery of uncommitted records to the next consumer that attaches.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::error::{Error, Result};

use super::{JobQueue, QueueConsumer, QueueMessage};

pub const DEFAULT_PARTITIONS: u32 = 8;

#[derive(Debug, Clone)]
struct Record {
    key: Vec<u8>,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct QueueState {
    partitions: Vec<Vec<Record>>,
    /// Committed offset per (group, partition): the next offset to deliver
    /// to a freshly attached consumer of that group.
    committed: HashMap<(String, u32), u64>,
}

#[derive(Debug)]
pub struct MemoryQueue {
    partition_count: u32,
    state: Mutex<QueueState>,
    notify: Notify,
    fail_enqueue: AtomicBool,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    pub fn with_partitions(partition_count: u32) -> Self {
        let partition_count = partition_count.max(1);
        Self {
            partition_count,
            state: Mutex::new(QueueState {
                partitions: vec![Vec::new(); partition_count as usize],
                committed: HashMap::new(),
            }),
            notify: Notify::new(),
            fail_enqueue: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent enqueue fail with `QueueUnavailable` until
    /// cleared, simulating a broker outage.
    pub fn inject_enqueue_failure(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Partition a key would be routed to.
    pub fn partition_for(&self, key: &[u8]) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partition_count)) as u32
    }

    /// Total records across all partitions.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.partitions.iter().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Committed offset for a group on one partition.
    pub async fn committed(&self, group: &str, partition: u32) -> u64 {
        let state = self.state.lock().await;
        state
            .committed
            .get(&(group.to_string(), partition))
            .copied()
            .unwrap_or(0)
    }

    /// All payloads currently in the log, in partition order.
    pub async fn payloads(&self) -> Vec<Vec<u8>> {
        let state = self.state.lock().await;
        state
            .partitions
            .iter()
            .flat_map(|records| records.iter().map(|record| record.payload.clone()))
            .collect()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, key: &[u8], payload: &[u8]) -> Result<()> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(Error::QueueUnavailable(
                "injected enqueue failure".to_string(),
            ));
        }

        let partition = self.partition_for(key);
        {
            let mut state = self.state.lock().await;
            state.partitions[partition as usize].push(Record {
                key: key.to_vec(),
                payload: payload.to_vec(),
            });
        }
        self.notify.notify_waiters();
        Ok(())
    }
}

/// A consumer instance attached to one group. Its read positions start at
/// the group's committed offsets, so anything fetched but never committed by
/// a previous instance is delivered again.
#[derive(Debug)]
pub struct MemoryConsumer {
    queue: Arc<MemoryQueue>,
    group: String,
    positions: HashMap<u32, u64>,
}

impl MemoryConsumer {
    pub async fn attach(queue: Arc<MemoryQueue>, group: impl Into<String>) -> Self {
        let group = group.into();
        let positions = {
            let state = queue.state.lock().await;
            (0..queue.partition_count)
                .map(|partition| {
                    let committed = state
                        .committed
                        .get(&(group.clone(), partition))
                        .copied()
                        .unwrap_or(0);
                    (partition, committed)
                })
                .collect()
        };
        Self {
            queue,
            group,
            positions,
        }
    }

    async fn try_fetch(&mut self) -> Option<QueueMessage> {
        let state = self.queue.state.lock().await;
        for partition in 0..self.queue.partition_count {
            let position = self.positions.get(&partition).copied().unwrap_or(0);
            if let Some(record) = state.partitions[partition as usize].get(position as usize) {
                self.positions.insert(partition, position + 1);
                return Some(QueueMessage {
                    partition,
                    offset: position,
                    key: record.key.clone(),
                    payload: record.payload.clone(),
                });
            }
        }
        None
    }
}

#[async_trait]
impl QueueConsumer for MemoryConsumer {
    async fn fetch(&mut self) -> Result<QueueMessage> {
        loop {
            let queue = Arc::clone(&self.queue);
            let notified = queue.notify.notified();
            if let Some(message) = self.try_fetch().await {
                return Ok(message);
            }
            notified.await;
        }
    }

    async fn commit(&mut self, message: &QueueMessage) -> Result<()> {
        let mut state = self.queue.state.lock().await;
        let entry = state
            .committed
            .entry((self.group.clone(), message.partition))
            .or_insert(0);
        *entry = (*entry).max(message.offset + 1);
        Ok(())
    }
}
