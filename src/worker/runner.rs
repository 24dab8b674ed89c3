use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::scheduler::ScheduledJobEnvelope;

use super::AutomationRunner;

/// Drives an out-of-process automation server: spawns the configured
/// command through the shell and writes the envelope JSON to its stdin.
/// A zero exit status is success; anything else surfaces stderr.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: String,
}

impl ProcessRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl AutomationRunner for ProcessRunner {
    async fn run(&self, envelope: &ScheduledJobEnvelope) -> Result<()> {
        tracing::info!(
            job_id = %envelope.job_id,
            command = %self.command,
            "Handing job to automation command"
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| Error::Runner(format!("failed to spawn automation command: {err}")))?;

        // Feed stdin from its own task while draining stdout/stderr below;
        // a child that fills a pipe before reading the envelope would
        // otherwise deadlock against the sequential write.
        let input = serde_json::to_vec(envelope)?;
        let stdin = child.stdin.take();
        let writer = tokio::spawn(async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            stdin.write_all(&input).await
            // Dropping the handle closes the pipe so the child sees EOF.
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| Error::Runner(format!("automation command did not finish: {err}")))?;

        // A command may legitimately exit without draining its stdin; judge
        // the run by its exit status and only note the broken write.
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(
                    job_id = %envelope.job_id,
                    error = %err,
                    "Automation command stopped reading the envelope"
                );
            }
            Err(err) => {
                tracing::warn!(
                    job_id = %envelope.job_id,
                    error = %err,
                    "Envelope writer task failed"
                );
            }
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            format!("exit code: {:?}", output.status.code())
        } else {
            stderr.trim().to_string()
        };
        Err(Error::Runner(detail))
    }
}
