use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 300;
pub const DEFAULT_LIMIT_PER_MINUTE: i64 = 60;
pub const DEFAULT_LIMIT_PER_HOUR: i64 = 1_000;
pub const DEFAULT_ACCOUNT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_SCHEDULER_SERVER_PORT: u16 = 8081;

/// Configuration for the job submission front door.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
    /// TTL of the dedup lease; also the dedup window.
    pub lock_ttl: Duration,
    pub limit_per_minute: i64,
    pub limit_per_hour: i64,
    pub listen_port: u16,
}

impl SchedulerConfig {
    /// Reads the scheduler configuration from the environment:
    ///
    ///   KAFKA_BROKERS           - comma-separated brokers (required)
    ///   KAFKA_TOPIC             - queue topic (required)
    ///   REDIS_ADDR              - lease + rate-limit backend (required)
    ///   REDIS_PASSWORD          - backend password (optional)
    ///   REDIS_DB                - backend DB index (optional, default 0)
    ///   LOCK_TTL_SECONDS        - dedup window (optional, default 300)
    ///   THROTTLE_PER_MINUTE     - minute-window cap (optional, default 60)
    ///   THROTTLE_PER_HOUR       - hour-window cap (optional, default 1000)
    ///   SCHEDULER_SERVER_PORT   - listen port (optional, default 8081)
    pub fn from_env() -> Result<Self> {
        let brokers = split_brokers(&required("KAFKA_BROKERS")?);
        if brokers.is_empty() {
            return Err(Error::Config("KAFKA_BROKERS must not be empty".to_string()));
        }

        let lock_ttl_seconds =
            positive_or("LOCK_TTL_SECONDS", DEFAULT_LOCK_TTL_SECONDS as i64) as u64;

        Ok(Self {
            brokers,
            topic: required("KAFKA_TOPIC")?,
            redis_addr: required("REDIS_ADDR")?,
            redis_password: env::var("REDIS_PASSWORD").unwrap_or_default(),
            redis_db: parse_or("REDIS_DB", 0),
            lock_ttl: Duration::from_secs(lock_ttl_seconds),
            limit_per_minute: positive_or("THROTTLE_PER_MINUTE", DEFAULT_LIMIT_PER_MINUTE),
            limit_per_hour: positive_or("THROTTLE_PER_HOUR", DEFAULT_LIMIT_PER_HOUR),
            listen_port: parse_or("SCHEDULER_SERVER_PORT", DEFAULT_SCHEDULER_SERVER_PORT),
        })
    }
}

/// Configuration for the queue consumer tier.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub consumer_group: String,
    /// Command the built-in process runner drives for each job.
    pub runner_command: String,
}

impl WorkerConfig {
    /// Reads the worker configuration from the environment:
    ///
    ///   KAFKA_BROKERS        - comma-separated brokers (required)
    ///   KAFKA_TOPIC          - queue topic (required)
    ///   KAFKA_CONSUMER_GROUP - consumer group (or MCP_CONSUMER_GROUP)
    ///   MCP_RUNNER_COMMAND   - automation command fed each envelope (required)
    pub fn from_env() -> Result<Self> {
        let brokers = split_brokers(&required("KAFKA_BROKERS")?);
        if brokers.is_empty() {
            return Err(Error::Config("KAFKA_BROKERS must not be empty".to_string()));
        }

        let consumer_group = match env::var("KAFKA_CONSUMER_GROUP") {
            Ok(group) if !group.trim().is_empty() => group,
            _ => required("MCP_CONSUMER_GROUP")?,
        };

        Ok(Self {
            brokers,
            topic: required("KAFKA_TOPIC")?,
            consumer_group,
            runner_command: required("MCP_RUNNER_COMMAND")?,
        })
    }
}

/// Configuration for the account provisioning front door.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub aws_region: String,
    /// Cluster identity provider the tenant IAM roles federate to.
    pub cluster_arn: String,
    /// Path to a kubeconfig file; empty means in-cluster config.
    pub kubeconfig_path: String,
    pub listen_port: u16,
}

impl ProvisionerConfig {
    /// Reads the provisioner configuration from the environment:
    ///
    ///   AWS_REGION           - cloud region (required)
    ///   CLUSTER_ARN          - cluster identity for IAM trust (required)
    ///   KUBECONFIG           - kubeconfig path (optional, empty = in-cluster)
    ///   ACCOUNT_SERVER_PORT  - listen port (optional, default 8080)
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            aws_region: required("AWS_REGION")?,
            cluster_arn: required("CLUSTER_ARN")?,
            kubeconfig_path: env::var("KUBECONFIG").unwrap_or_default(),
            listen_port: parse_or("ACCOUNT_SERVER_PORT", DEFAULT_ACCOUNT_SERVER_PORT),
        })
    }
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!("{name} must be set"))),
    }
}

fn split_brokers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Like `parse_or`, but non-positive values fall back to the default as well.
fn positive_or(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_brokers_trims_and_drops_empties() {
        let brokers = split_brokers("kafka-0:9092, kafka-1:9092,,  ");
        assert_eq!(brokers, vec!["kafka-0:9092", "kafka-1:9092"]);
    }

    #[test]
    fn test_positive_or_rejects_non_positive() {
        // Unset variable falls back to the default.
        assert_eq!(positive_or("MCP_TEST_UNSET_THROTTLE", 60), 60);
    }
}
