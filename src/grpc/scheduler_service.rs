use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::proto::mcp_job_service_server::McpJobService;
use crate::proto::{
    CancelJobRequest, CancelJobResponse, CreateJobRequest, CreateJobResponse, GetJobLogsRequest,
    GetJobLogsResponse, GetJobRequest, GetJobResponse, JobStatus as ProtoJobStatus,
    ListJobsRequest, ListJobsResponse,
};
use crate::scheduler::{JobRequest, Scheduler};

/// Front door for job submission.
pub struct JobService {
    scheduler: Arc<Scheduler>,
}

impl JobService {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[tonic::async_trait]
impl McpJobService for JobService {
    async fn create_job(
        &self,
        request: Request<CreateJobRequest>,
    ) -> Result<Response<CreateJobResponse>, Status> {
        let req = request.into_inner();

        let job_request = JobRequest {
            organization_id: req.organization_id,
            job_type: req.job_type,
            prompt: req.prompt,
            payload: req.payload,
            parameters: req.parameters,
            timeout_seconds: req.timeout_seconds,
            callback_url: req.callback_url,
        };
        let organization_id = job_request.organization_id.clone();

        let scheduled = self.scheduler.schedule_job(job_request).await?;

        Ok(Response::new(CreateJobResponse {
            job_id: scheduled.job_id,
            organization_id,
            status: ProtoJobStatus::Pending as i32,
            namespace: String::new(),
            pod_name: String::new(),
            estimated_ttl_seconds: scheduled.timeout_seconds,
        }))
    }

    async fn get_job(
        &self,
        _request: Request<GetJobRequest>,
    ) -> Result<Response<GetJobResponse>, Status> {
        Err(Status::unimplemented("GetJob is not implemented"))
    }

    async fn list_jobs(
        &self,
        _request: Request<ListJobsRequest>,
    ) -> Result<Response<ListJobsResponse>, Status> {
        Err(Status::unimplemented("ListJobs is not implemented"))
    }

    async fn cancel_job(
        &self,
        _request: Request<CancelJobRequest>,
    ) -> Result<Response<CancelJobResponse>, Status> {
        Err(Status::unimplemented("CancelJob is not implemented"))
    }

    async fn get_job_logs(
        &self,
        _request: Request<GetJobLogsRequest>,
    ) -> Result<Response<GetJobLogsResponse>, Status> {
        Err(Status::unimplemented("GetJobLogs is not implemented"))
    }
}
