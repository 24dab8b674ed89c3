use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::error::Result;
use crate::proto::account_provisioning_service_server::AccountProvisioningServiceServer;
use crate::proto::mcp_job_service_server::McpJobServiceServer;

use super::{AccountService, JobService};

/// tonic server hosting one or both front doors.
pub struct GrpcServer {
    addr: SocketAddr,
    account_service: Option<AccountService>,
    job_service: Option<JobService>,
}

impl GrpcServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            account_service: None,
            job_service: None,
        }
    }

    pub fn with_account_service(mut self, service: AccountService) -> Self {
        self.account_service = Some(service);
        self
    }

    pub fn with_job_service(mut self, service: JobService) -> Self {
        self.job_service = Some(service);
        self
    }

    /// Serves until `shutdown` is cancelled, then drains gracefully.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(addr = %self.addr, "Starting gRPC server");

        Server::builder()
            .add_optional_service(
                self.account_service
                    .map(AccountProvisioningServiceServer::new),
            )
            .add_optional_service(self.job_service.map(McpJobServiceServer::new))
            .serve_with_shutdown(self.addr, shutdown.cancelled())
            .await?;

        tracing::info!(addr = %self.addr, "gRPC server stopped");
        Ok(())
    }
}
