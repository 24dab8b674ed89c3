use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded for organization {organization_id}; remaining: {remaining}")]
    RateLimited {
        organization_id: String,
        remaining: i64,
    },

    #[error("duplicate job detected for this tenant and automation; retry after the dedup window expires")]
    DuplicateJob,

    #[error("unknown plan tier: {0}")]
    InvalidTier(i32),

    #[error("lease store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("lease {key} is not held by this owner")]
    LeaseNotOwned { key: String },

    #[error("envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("automation runner error: {0}")]
    Runner(String),

    #[error("cluster API error: {0}")]
    Cluster(String),

    #[error("IAM API error: {0}")]
    Iam(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
