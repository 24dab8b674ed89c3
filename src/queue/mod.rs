//! Partitioned, keyed, at-least-once job queue contracts.
//!
//! The producer side is a single `enqueue`; messages are partitioned by a
//! hash of their key, so every submission keyed by the same tenant lands on
//! the same partition and is consumed in order. The consumer side reads
//! through a named group whose committed offsets advance only on explicit
//! commit - an uncommitted message is redelivered to the next consumer
//! instance of the group.

pub mod memory;

pub use memory::{MemoryConsumer, MemoryQueue};

use async_trait::async_trait;

use crate::error::Result;

/// A single record as read from a partition.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub partition: u32,
    pub offset: u64,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Publishes `payload` under `key`. Returns only once the backend has
    /// durably accepted the record; failures surface as `QueueUnavailable`.
    async fn enqueue(&self, key: &[u8], payload: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait QueueConsumer: Send {
    /// Blocks until the next message for this consumer's group is available.
    async fn fetch(&mut self) -> Result<QueueMessage>;

    /// Marks `message` consumed for the group. Redelivery stops only after
    /// a commit; a crashed consumer leaves the offset where it was.
    async fn commit(&mut self, message: &QueueMessage) -> Result<()>;
}
