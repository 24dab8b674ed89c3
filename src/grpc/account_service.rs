use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::proto::account_provisioning_service_server::AccountProvisioningService;
use crate::proto::{
    CreateAccountRequest, CreateAccountResponse, DeleteAccountRequest, DeleteAccountResponse,
    GetAccountRequest, GetAccountResponse, ListAccountsRequest, ListAccountsResponse,
    ResourceQuota as ProtoResourceQuota, UpdateAccountRequest, UpdateAccountResponse,
};
use crate::provisioner::{PlanTier, Provisioner, QuotaSpec};

/// Front door for tenant account provisioning.
pub struct AccountService {
    provisioner: Arc<Provisioner>,
}

impl AccountService {
    pub fn new(provisioner: Arc<Provisioner>) -> Self {
        Self { provisioner }
    }
}

#[tonic::async_trait]
impl AccountProvisioningService for AccountService {
    async fn create_account(
        &self,
        request: Request<CreateAccountRequest>,
    ) -> Result<Response<CreateAccountResponse>, Status> {
        let req = request.into_inner();

        let tier = PlanTier::from_proto(req.plan_tier)?;
        let account = self
            .provisioner
            .provision_account(&req.organization_id, tier, &req.s3_bucket)
            .await?;

        Ok(Response::new(CreateAccountResponse {
            organization_id: account.organization_id,
            namespace: account.namespace,
            organization_type: req.organization_type,
            plan_tier: req.plan_tier,
            iam_role_arn: account.iam_role_arn,
            s3_bucket: account.s3_bucket,
            s3_prefix: account.s3_prefix,
            resource_quota: Some(quota_to_proto(&account.resource_quota)),
            status: "ACTIVE".to_string(),
        }))
    }

    async fn get_account(
        &self,
        _request: Request<GetAccountRequest>,
    ) -> Result<Response<GetAccountResponse>, Status> {
        Err(Status::unimplemented("GetAccount is not implemented"))
    }

    async fn update_account(
        &self,
        _request: Request<UpdateAccountRequest>,
    ) -> Result<Response<UpdateAccountResponse>, Status> {
        Err(Status::unimplemented("UpdateAccount is not implemented"))
    }

    async fn delete_account(
        &self,
        request: Request<DeleteAccountRequest>,
    ) -> Result<Response<DeleteAccountResponse>, Status> {
        let req = request.into_inner();

        self.provisioner.delete_account(&req.organization_id).await?;

        Ok(Response::new(DeleteAccountResponse {
            organization_id: req.organization_id,
            status: "DELETED".to_string(),
        }))
    }

    async fn list_accounts(
        &self,
        _request: Request<ListAccountsRequest>,
    ) -> Result<Response<ListAccountsResponse>, Status> {
        Err(Status::unimplemented("ListAccounts is not implemented"))
    }
}

fn quota_to_proto(quota: &QuotaSpec) -> ProtoResourceQuota {
    ProtoResourceQuota {
        requests_cpu: quota.requests_cpu.clone(),
        requests_memory: quota.requests_memory.clone(),
        limits_cpu: quota.limits_cpu.clone(),
        limits_memory: quota.limits_memory.clone(),
        max_pvcs: quota.max_pvcs,
        max_services: quota.max_services,
        max_deployments: quota.max_deployments,
        max_statefulsets: quota.max_statefulsets,
    }
}
