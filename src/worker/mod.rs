//! Queue consumer tier: decode envelopes and drive the automation runner.
//!
//! The worker couples offset commits to runner success:
//! - **Runner succeeded**: commit, the job never redelivers.
//! - **Runner failed**: no commit, the broker redelivers after a rebalance
//!   or restart.
//! - **Envelope undecodable**: commit to skip - a poison pill never makes
//!   progress when retried, so it must not block the partition.
//! - **Cancelled**: return cleanly without committing the in-flight message.

pub mod runner;

pub use runner::ProcessRunner;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::queue::QueueConsumer;
use crate::scheduler::ScheduledJobEnvelope;

/// Executes one scheduled automation. Implementations may drive an
/// in-process engine or speak to a separate process; the worker treats them
/// as opaque.
#[async_trait]
pub trait AutomationRunner: Send + Sync {
    async fn run(&self, envelope: &ScheduledJobEnvelope) -> Result<()>;
}

pub struct Worker<C> {
    consumer: C,
    runner: Arc<dyn AutomationRunner>,
}

impl<C: QueueConsumer> Worker<C> {
    pub fn new(consumer: C, runner: Arc<dyn AutomationRunner>) -> Self {
        Self { consumer, runner }
    }

    /// Consume loop. Blocks until `shutdown` is cancelled or the queue
    /// backend fails; returns `Ok` on cancellation.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        loop {
            let message = tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Worker shutting down");
                    return Ok(());
                }
                message = self.consumer.fetch() => message?,
            };

            let envelope: ScheduledJobEnvelope = match serde_json::from_slice(&message.payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %err,
                        "Skipping undecodable message"
                    );
                    self.consumer.commit(&message).await?;
                    continue;
                }
            };

            tracing::info!(
                job_id = %envelope.job_id,
                organization_id = %envelope.organization_id,
                job_type = %envelope.job_type,
                "Dispatching job"
            );

            let outcome = tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!(
                        job_id = %envelope.job_id,
                        "Cancelled mid-run; offset left uncommitted"
                    );
                    return Ok(());
                }
                outcome = self.runner.run(&envelope) => outcome,
            };

            match outcome {
                Ok(()) => {
                    self.consumer.commit(&message).await?;
                    tracing::info!(job_id = %envelope.job_id, "Job completed");
                }
                Err(err) => {
                    tracing::error!(
                        job_id = %envelope.job_id,
                        error = %err,
                        "Automation runner failed; offset not committed"
                    );
                }
            }
        }
    }
}
