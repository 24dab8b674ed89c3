//! Tenant provisioning: namespace, quota, IAM identity, storage policy and
//! RBAC composed as a saga.
//!
//! Each step has a known inverse. A failed step compensates everything that
//! already succeeded, in reverse order; compensation is best-effort and
//! continues past its own failures (a stuck rollback logs orphans instead of
//! aborting). The network policy step alone is advisory and never fails the
//! provision.

pub mod cluster;
pub mod iam;
pub mod quota;

pub use cluster::{
    ClusterApi, MemoryCluster, NamespaceSpec, PolicyRule, RoleSpec, ServiceAccountSpec,
};
pub use iam::{IamApi, MemoryIam};
pub use quota::{PlanTier, QuotaSpec};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};

pub const SERVICE_ACCOUNT_NAME: &str = "tenant-sa";
pub const QUOTA_NAME: &str = "tenant-quota";
pub const S3_POLICY_NAME: &str = "tenant-s3-access";
pub const ADMIN_ROLE_NAME: &str = "tenant-admin";
pub const USER_ROLE_NAME: &str = "tenant-user";

const MANAGED_BY: &str = "account-provisioning-service";

pub fn namespace_name(organization_id: &str) -> String {
    format!("tenant-{organization_id}")
}

pub fn iam_role_name(organization_id: &str) -> String {
    format!("tenant-{organization_id}-role")
}

pub fn s3_prefix(organization_id: &str) -> String {
    format!("orgs/{organization_id}")
}

/// Everything created for a tenant account.
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    pub organization_id: String,
    pub namespace: String,
    pub iam_role_arn: String,
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub resource_quota: QuotaSpec,
}

pub struct Provisioner {
    cluster: Arc<dyn ClusterApi>,
    iam: Arc<dyn IamApi>,
    cluster_arn: String,
}

impl Provisioner {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        iam: Arc<dyn IamApi>,
        cluster_arn: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            iam,
            cluster_arn: cluster_arn.into(),
        }
    }

    /// Provisions every resource for a new tenant, or compensates back to
    /// nothing and surfaces the failing step's error.
    pub async fn provision_account(
        &self,
        organization_id: &str,
        tier: PlanTier,
        s3_bucket: &str,
    ) -> Result<ProvisionedAccount> {
        if organization_id.is_empty() {
            return Err(Error::InvalidRequest(
                "organization_id is required".to_string(),
            ));
        }

        let namespace = namespace_name(organization_id);
        let role_name = iam_role_name(organization_id);
        let quota = tier.quota();

        // 1. Namespace. Nothing to compensate if this fails.
        let namespace_spec = NamespaceSpec {
            name: namespace.clone(),
            labels: BTreeMap::from([
                ("tenant-id".to_string(), organization_id.to_string()),
                ("plan-tier".to_string(), tier.to_string()),
                ("managed-by".to_string(), MANAGED_BY.to_string()),
                ("created-at".to_string(), Utc::now().to_rfc3339()),
            ]),
            annotations: BTreeMap::from([
                (
                    "organization-id".to_string(),
                    organization_id.to_string(),
                ),
                (
                    "description".to_string(),
                    format!("Tenant namespace for organization {organization_id}"),
                ),
            ]),
        };
        self.cluster.create_namespace(&namespace_spec).await?;

        // 2. Resource quota.
        if let Err(err) = self
            .cluster
            .create_resource_quota(&namespace, QUOTA_NAME, &quota)
            .await
        {
            self.delete_namespace_best_effort(&namespace).await;
            return Err(err);
        }

        // 3. IAM role federated to the tenant service account.
        let trust_policy = iam::trust_policy_document(&self.cluster_arn, organization_id);
        let tags = BTreeMap::from([
            ("tenant-id".to_string(), organization_id.to_string()),
            ("managed-by".to_string(), MANAGED_BY.to_string()),
        ]);
        let iam_role_arn = match self.iam.create_role(&role_name, &trust_policy, &tags).await {
            Ok(arn) => arn,
            Err(err) => {
                self.delete_namespace_best_effort(&namespace).await;
                return Err(err);
            }
        };

        // 4. Scoped object-store policy, only when a bucket was requested.
        let mut bucket = String::new();
        let mut prefix = String::new();
        if !s3_bucket.is_empty() {
            let document = iam::s3_access_policy_document(s3_bucket, organization_id);
            if let Err(err) = self
                .iam
                .put_role_policy(&role_name, S3_POLICY_NAME, &document)
                .await
            {
                self.compensate(organization_id, &namespace, &role_name).await;
                return Err(err);
            }
            bucket = s3_bucket.to_string();
            prefix = s3_prefix(organization_id);
        }

        // 5. Service account annotated to assume the role.
        let service_account = ServiceAccountSpec {
            namespace: namespace.clone(),
            name: SERVICE_ACCOUNT_NAME.to_string(),
            labels: BTreeMap::from([(
                "tenant-id".to_string(),
                organization_id.to_string(),
            )]),
            annotations: BTreeMap::from([(
                "eks.amazonaws.com/role-arn".to_string(),
                iam_role_arn.clone(),
            )]),
        };
        if let Err(err) = self.cluster.create_service_account(&service_account).await {
            self.compensate(organization_id, &namespace, &role_name).await;
            return Err(err);
        }

        // 6. Namespace-scoped RBAC.
        if let Err(err) = self.create_rbac(&namespace).await {
            self.compensate(organization_id, &namespace, &role_name).await;
            return Err(err);
        }

        // 7. Network policy is best effort.
        if let Err(err) = self.cluster.apply_network_policy(&namespace).await {
            tracing::warn!(
                namespace = %namespace,
                error = %err,
                "Failed to apply network policy"
            );
        }

        tracing::info!(
            organization_id,
            namespace = %namespace,
            tier = %tier,
            "Tenant account provisioned"
        );

        Ok(ProvisionedAccount {
            organization_id: organization_id.to_string(),
            namespace,
            iam_role_arn,
            s3_bucket: bucket,
            s3_prefix: prefix,
            resource_quota: quota,
        })
    }

    async fn create_rbac(&self, namespace: &str) -> Result<()> {
        let admin_role = RoleSpec {
            name: ADMIN_ROLE_NAME.to_string(),
            rules: vec![PolicyRule {
                api_groups: vec!["*".to_string()],
                resources: vec!["*".to_string()],
                verbs: vec!["*".to_string()],
            }],
        };
        self.cluster.create_role(namespace, &admin_role).await?;

        let user_role = RoleSpec {
            name: USER_ROLE_NAME.to_string(),
            rules: vec![PolicyRule {
                api_groups: vec![String::new(), "apps".to_string()],
                resources: vec![
                    "pods".to_string(),
                    "services".to_string(),
                    "deployments".to_string(),
                ],
                verbs: vec![
                    "get".to_string(),
                    "list".to_string(),
                    "watch".to_string(),
                ],
            }],
        };
        self.cluster.create_role(namespace, &user_role).await
    }

    /// Reverse-order cleanup after a failed provision: namespace cascade
    /// first, then the inline policy, then the role (which cannot be
    /// deleted while the policy exists).
    async fn compensate(&self, organization_id: &str, namespace: &str, role_name: &str) {
        self.delete_namespace_best_effort(namespace).await;
        if let Err(err) = self.iam.delete_role_policy(role_name, S3_POLICY_NAME).await {
            tracing::warn!(
                organization_id,
                role = role_name,
                error = %err,
                "Rollback: failed to delete inline policy"
            );
        }
        if let Err(err) = self.iam.delete_role(role_name).await {
            tracing::warn!(
                organization_id,
                role = role_name,
                error = %err,
                "Rollback: failed to delete IAM role"
            );
        }
    }

    async fn delete_namespace_best_effort(&self, namespace: &str) {
        if let Err(err) = self.cluster.delete_namespace(namespace).await {
            tracing::warn!(
                namespace,
                error = %err,
                "Rollback: failed to delete namespace"
            );
        }
    }

    /// Tears a tenant down: namespace (cascade) first - its failure is
    /// fatal - then the inline policy, then the role.
    pub async fn delete_account(&self, organization_id: &str) -> Result<()> {
        let namespace = namespace_name(organization_id);
        let role_name = iam_role_name(organization_id);

        self.cluster.delete_namespace(&namespace).await?;

        if let Err(err) = self.iam.delete_role_policy(&role_name, S3_POLICY_NAME).await {
            tracing::warn!(
                organization_id,
                role = %role_name,
                error = %err,
                "No inline policy removed during account deletion"
            );
        }
        self.iam.delete_role(&role_name).await?;

        tracing::info!(organization_id, "Tenant account deleted");
        Ok(())
    }
}
