//! Narrow IAM surface: role lifecycle plus inline policies.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

#[async_trait]
pub trait IamApi: Send + Sync {
    /// Creates the role with the given trust policy and tags; returns its ARN.
    async fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String>;

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()>;

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()>;

    /// Deletes the role. Inline policies must have been deleted first.
    async fn delete_role(&self, role_name: &str) -> Result<()>;
}

/// Federation trust policy binding a tenant role to its service account
/// through the cluster's identity provider.
pub fn trust_policy_document(cluster_arn: &str, organization_id: &str) -> String {
    let subject = format!("system:serviceaccount:tenant-{organization_id}:tenant-sa");
    let mut string_equals = serde_json::Map::new();
    string_equals.insert(
        format!("{cluster_arn}:sub"),
        serde_json::Value::String(subject),
    );

    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Federated": cluster_arn },
            "Action": "sts:AssumeRoleWithWebIdentity",
            "Condition": { "StringEquals": string_equals }
        }]
    })
    .to_string()
}

/// Inline policy granting object access under the tenant's prefix only.
pub fn s3_access_policy_document(bucket: &str, organization_id: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": [
                "s3:GetObject",
                "s3:PutObject",
                "s3:DeleteObject",
                "s3:ListBucket"
            ],
            "Resource": [
                format!("arn:aws:s3:::{bucket}/orgs/{organization_id}/*"),
                format!("arn:aws:s3:::{bucket}")
            ],
            "Condition": {
                "StringLike": { "s3:prefix": format!("orgs/{organization_id}/*") }
            }
        }]
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub struct IamRoleRecord {
    pub arn: String,
    pub trust_policy: String,
    pub tags: BTreeMap<String, String>,
    pub inline_policies: HashMap<String, String>,
}

/// In-memory IAM with the same ordering constraint as the real service:
/// a role with inline policies cannot be deleted.
#[derive(Debug, Default)]
pub struct MemoryIam {
    roles: Mutex<HashMap<String, IamRoleRecord>>,
    fail_ops: Mutex<HashSet<String>>,
}

impl MemoryIam {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named operation fail until cleared. Operation names match
    /// the `IamApi` method names.
    pub async fn fail_on(&self, operation: &str) {
        self.fail_ops.lock().await.insert(operation.to_string());
    }

    pub async fn clear_failures(&self) {
        self.fail_ops.lock().await.clear();
    }

    async fn check(&self, operation: &str) -> Result<()> {
        if self.fail_ops.lock().await.contains(operation) {
            return Err(Error::Iam(format!("injected {operation} failure")));
        }
        Ok(())
    }

    pub async fn role(&self, name: &str) -> Option<IamRoleRecord> {
        self.roles.lock().await.get(name).cloned()
    }

    pub async fn role_exists(&self, name: &str) -> bool {
        self.roles.lock().await.contains_key(name)
    }
}

#[async_trait]
impl IamApi for MemoryIam {
    async fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String> {
        self.check("create_role").await?;
        let mut roles = self.roles.lock().await;
        if roles.contains_key(name) {
            return Err(Error::Iam(format!("role {name} already exists")));
        }
        let arn = format!("arn:aws:iam::000000000000:role/{name}");
        roles.insert(
            name.to_string(),
            IamRoleRecord {
                arn: arn.clone(),
                trust_policy: trust_policy.to_string(),
                tags: tags.clone(),
                inline_policies: HashMap::new(),
            },
        );
        Ok(arn)
    }

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()> {
        self.check("put_role_policy").await?;
        let mut roles = self.roles.lock().await;
        let record = roles
            .get_mut(role_name)
            .ok_or_else(|| Error::Iam(format!("role {role_name} not found")))?;
        record
            .inline_policies
            .insert(policy_name.to_string(), document.to_string());
        Ok(())
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()> {
        self.check("delete_role_policy").await?;
        let mut roles = self.roles.lock().await;
        let record = roles
            .get_mut(role_name)
            .ok_or_else(|| Error::Iam(format!("role {role_name} not found")))?;
        if record.inline_policies.remove(policy_name).is_none() {
            return Err(Error::Iam(format!(
                "role {role_name} has no inline policy {policy_name}"
            )));
        }
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        self.check("delete_role").await?;
        let mut roles = self.roles.lock().await;
        let record = roles
            .get(role_name)
            .ok_or_else(|| Error::Iam(format!("role {role_name} not found")))?;
        if !record.inline_policies.is_empty() {
            return Err(Error::Iam(format!(
                "role {role_name} still has inline policies"
            )));
        }
        roles.remove(role_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_policy_binds_tenant_service_account() {
        let document = trust_policy_document("arn:aws:eks:eu-west-1:1:cluster/main", "acme");
        let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();

        let condition = &parsed["Statement"][0]["Condition"]["StringEquals"]
            ["arn:aws:eks:eu-west-1:1:cluster/main:sub"];
        assert_eq!(condition, "system:serviceaccount:tenant-acme:tenant-sa");
    }

    #[test]
    fn test_s3_policy_is_scoped_to_tenant_prefix() {
        let document = s3_access_policy_document("shared-bucket", "acme");
        let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();

        let resources = parsed["Statement"][0]["Resource"].as_array().unwrap();
        assert!(resources.contains(&serde_json::Value::String(
            "arn:aws:s3:::shared-bucket/orgs/acme/*".to_string()
        )));
        assert_eq!(
            parsed["Statement"][0]["Condition"]["StringLike"]["s3:prefix"],
            "orgs/acme/*"
        );
    }

    #[tokio::test]
    async fn test_role_with_inline_policy_cannot_be_deleted() {
        let iam = MemoryIam::new();
        let tags = BTreeMap::new();
        iam.create_role("r", "{}", &tags).await.unwrap();
        iam.put_role_policy("r", "p", "{}").await.unwrap();

        assert!(iam.delete_role("r").await.is_err());
        iam.delete_role_policy("r", "p").await.unwrap();
        iam.delete_role("r").await.unwrap();
        assert!(!iam.role_exists("r").await);
    }
}
