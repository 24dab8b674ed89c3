//! Narrow Kubernetes surface the provisioner composes over.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

use super::quota::QuotaSpec;

#[derive(Debug, Clone)]
pub struct NamespaceSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ServiceAccountSpec {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

/// Namespace-scoped RBAC rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_namespace(&self, spec: &NamespaceSpec) -> Result<()>;

    /// Deletes the namespace, cascading every in-namespace object.
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    async fn create_resource_quota(
        &self,
        namespace: &str,
        name: &str,
        quota: &QuotaSpec,
    ) -> Result<()>;

    async fn create_service_account(&self, spec: &ServiceAccountSpec) -> Result<()>;

    async fn create_role(&self, namespace: &str, role: &RoleSpec) -> Result<()>;

    async fn apply_network_policy(&self, namespace: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct NamespaceRecord {
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    quotas: HashMap<String, QuotaSpec>,
    service_accounts: HashMap<String, ServiceAccountSpec>,
    roles: HashMap<String, RoleSpec>,
    network_policy: bool,
}

/// In-memory cluster with per-operation failure injection. Namespace
/// deletion drops the record and everything under it, like the real
/// cascading delete.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    namespaces: Mutex<HashMap<String, NamespaceRecord>>,
    fail_ops: Mutex<HashSet<String>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named operation fail until cleared. Operation names match
    /// the `ClusterApi` method names.
    pub async fn fail_on(&self, operation: &str) {
        self.fail_ops.lock().await.insert(operation.to_string());
    }

    pub async fn clear_failures(&self) {
        self.fail_ops.lock().await.clear();
    }

    async fn check(&self, operation: &str) -> Result<()> {
        if self.fail_ops.lock().await.contains(operation) {
            return Err(Error::Cluster(format!("injected {operation} failure")));
        }
        Ok(())
    }

    pub async fn namespace_exists(&self, name: &str) -> bool {
        self.namespaces.lock().await.contains_key(name)
    }

    pub async fn namespace_labels(&self, name: &str) -> Option<BTreeMap<String, String>> {
        let namespaces = self.namespaces.lock().await;
        namespaces.get(name).map(|record| record.labels.clone())
    }

    pub async fn quota(&self, namespace: &str, name: &str) -> Option<QuotaSpec> {
        let namespaces = self.namespaces.lock().await;
        namespaces
            .get(namespace)
            .and_then(|record| record.quotas.get(name).cloned())
    }

    pub async fn service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<ServiceAccountSpec> {
        let namespaces = self.namespaces.lock().await;
        namespaces
            .get(namespace)
            .and_then(|record| record.service_accounts.get(name).cloned())
    }

    pub async fn role(&self, namespace: &str, name: &str) -> Option<RoleSpec> {
        let namespaces = self.namespaces.lock().await;
        namespaces
            .get(namespace)
            .and_then(|record| record.roles.get(name).cloned())
    }

    pub async fn has_network_policy(&self, namespace: &str) -> bool {
        let namespaces = self.namespaces.lock().await;
        namespaces
            .get(namespace)
            .is_some_and(|record| record.network_policy)
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    async fn create_namespace(&self, spec: &NamespaceSpec) -> Result<()> {
        self.check("create_namespace").await?;
        let mut namespaces = self.namespaces.lock().await;
        if namespaces.contains_key(&spec.name) {
            return Err(Error::Cluster(format!(
                "namespace {} already exists",
                spec.name
            )));
        }
        namespaces.insert(
            spec.name.clone(),
            NamespaceRecord {
                labels: spec.labels.clone(),
                annotations: spec.annotations.clone(),
                ..NamespaceRecord::default()
            },
        );
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.check("delete_namespace").await?;
        let mut namespaces = self.namespaces.lock().await;
        if namespaces.remove(name).is_none() {
            return Err(Error::Cluster(format!("namespace {name} not found")));
        }
        Ok(())
    }

    async fn create_resource_quota(
        &self,
        namespace: &str,
        name: &str,
        quota: &QuotaSpec,
    ) -> Result<()> {
        self.check("create_resource_quota").await?;
        let mut namespaces = self.namespaces.lock().await;
        let record = namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::Cluster(format!("namespace {namespace} not found")))?;
        record.quotas.insert(name.to_string(), quota.clone());
        Ok(())
    }

    async fn create_service_account(&self, spec: &ServiceAccountSpec) -> Result<()> {
        self.check("create_service_account").await?;
        let mut namespaces = self.namespaces.lock().await;
        let record = namespaces
            .get_mut(&spec.namespace)
            .ok_or_else(|| Error::Cluster(format!("namespace {} not found", spec.namespace)))?;
        record
            .service_accounts
            .insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn create_role(&self, namespace: &str, role: &RoleSpec) -> Result<()> {
        self.check("create_role").await?;
        let mut namespaces = self.namespaces.lock().await;
        let record = namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::Cluster(format!("namespace {namespace} not found")))?;
        record.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn apply_network_policy(&self, namespace: &str) -> Result<()> {
        self.check("apply_network_policy").await?;
        let mut namespaces = self.namespaces.lock().await;
        let record = namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::Cluster(format!("namespace {namespace} not found")))?;
        record.network_policy = true;
        Ok(())
    }
}
