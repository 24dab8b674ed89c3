use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A job submission as received by the front door, before admission.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub organization_id: String,
    pub job_type: String,
    pub prompt: String,
    pub payload: String,
    pub parameters: HashMap<String, String>,
    pub timeout_seconds: i32,
    pub callback_url: String,
}

impl JobRequest {
    pub fn validate(&self) -> Result<()> {
        if self.organization_id.is_empty() {
            return Err(Error::InvalidRequest(
                "organization_id is required".to_string(),
            ));
        }
        if self.job_type.is_empty() {
            return Err(Error::InvalidRequest("job_type is required".to_string()));
        }
        if self.prompt.is_empty() && self.payload.is_empty() {
            return Err(Error::InvalidRequest(
                "either prompt or payload is required".to_string(),
            ));
        }
        if self.timeout_seconds <= 0 {
            return Err(Error::InvalidRequest(
                "timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Deterministic digest of the submission content, used to detect
    /// duplicates. Parameters are folded in sorted by key, so the signature
    /// is stable under map reordering and across processes.
    pub fn signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prompt.as_bytes());
        hasher.update(self.job_type.as_bytes());
        hasher.update(self.payload.as_bytes());

        let mut pairs: Vec<(&String, &String)> = self.parameters.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in pairs {
            hasher.update(key.as_bytes());
            hasher.update(value.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Dedup lease key scoping the window to tenant + automation + content.
    pub fn lease_key(&self) -> String {
        format!(
            "mcp:job:{}:{}:{}",
            self.organization_id,
            self.job_type,
            self.signature()
        )
    }
}

/// Wire payload published to the queue for each admitted job. This is the
/// sole format between scheduler and worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJobEnvelope {
    pub job_id: String,
    pub organization_id: String,
    pub job_type: String,
    pub prompt: String,
    pub parameters: HashMap<String, String>,
    pub payload: String,
    pub timeout_seconds: i32,
    pub callback_url: String,
    pub created_at: DateTime<Utc>,
}

impl ScheduledJobEnvelope {
    /// Builds the envelope for an admitted request with a fresh job id.
    pub fn new(request: &JobRequest) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            organization_id: request.organization_id.clone(),
            job_type: request.job_type.clone(),
            prompt: request.prompt.clone(),
            parameters: request.parameters.clone(),
            payload: request.payload.clone(),
            timeout_seconds: request.timeout_seconds,
            callback_url: request.callback_url.clone(),
            created_at: Utc::now(),
        }
    }
}
