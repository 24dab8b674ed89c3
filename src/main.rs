use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mcp_control_plane::config::{ProvisionerConfig, SchedulerConfig, WorkerConfig};
use mcp_control_plane::grpc::{AccountService, GrpcServer, JobService};
use mcp_control_plane::lease::MemoryLeaseStore;
use mcp_control_plane::provisioner::{MemoryCluster, MemoryIam, Provisioner};
use mcp_control_plane::queue::{MemoryConsumer, MemoryQueue};
use mcp_control_plane::scheduler::Scheduler;
use mcp_control_plane::shutdown::install_shutdown_handler;
use mcp_control_plane::throttle::MemoryThrottle;
use mcp_control_plane::worker::{ProcessRunner, Worker};

#[derive(Parser, Debug)]
#[command(name = "mcp-control-plane")]
#[command(about = "Multi-tenant control plane for MCP automation jobs")]
struct Args {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Serve the account provisioning front door
    AccountServer,
    /// Serve the job submission front door
    SchedulerServer,
    /// Consume scheduled jobs and drive the automation runner
    Worker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let shutdown = install_shutdown_handler();

    match args.role {
        Role::AccountServer => {
            let config = ProvisionerConfig::from_env()?;
            tracing::info!(
                region = %config.aws_region,
                cluster_arn = %config.cluster_arn,
                "Starting account server"
            );

            let provisioner = Provisioner::new(
                Arc::new(MemoryCluster::new()),
                Arc::new(MemoryIam::new()),
                config.cluster_arn.clone(),
            );
            let addr: SocketAddr = format!("0.0.0.0:{}", config.listen_port).parse()?;
            GrpcServer::new(addr)
                .with_account_service(AccountService::new(Arc::new(provisioner)))
                .run(shutdown)
                .await?;
        }
        Role::SchedulerServer => {
            let config = SchedulerConfig::from_env()?;
            tracing::info!(
                brokers = ?config.brokers,
                topic = %config.topic,
                lock_ttl_seconds = config.lock_ttl.as_secs(),
                "Starting scheduler server"
            );

            let queue = Arc::new(MemoryQueue::new());
            let scheduler = Scheduler::new(
                queue,
                Arc::new(MemoryLeaseStore::new()),
                Arc::new(MemoryThrottle::new(
                    config.limit_per_minute,
                    config.limit_per_hour,
                )),
                config.lock_ttl,
            );
            let addr: SocketAddr = format!("0.0.0.0:{}", config.listen_port).parse()?;
            GrpcServer::new(addr)
                .with_job_service(JobService::new(Arc::new(scheduler)))
                .run(shutdown)
                .await?;
        }
        Role::Worker => {
            let config = WorkerConfig::from_env()?;
            tracing::info!(
                brokers = ?config.brokers,
                topic = %config.topic,
                group = %config.consumer_group,
                "Starting worker"
            );

            let queue = Arc::new(MemoryQueue::new());
            let consumer = MemoryConsumer::attach(queue, config.consumer_group.as_str()).await;
            let runner = Arc::new(ProcessRunner::new(config.runner_command.clone()));
            Worker::new(consumer, runner).run(shutdown).await?;
        }
    }

    Ok(())
}
