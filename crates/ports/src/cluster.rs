//! Cluster Client Port
//!
//! A pool resolves to exactly one cluster client and one namespace. The
//! client exposes only the orchestrator calls the job provisioner needs and
//! surfaces the orchestrator's own uniqueness and existence guarantees as
//! typed errors instead of masking them.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Errors reported by a cluster client
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("no cluster configured for pool {0}")]
    PoolNotFound(String),

    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn already_exists(kind: &str, name: &str) -> Self {
        Self::AlreadyExists {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::PoolNotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Orchestrator calls used by the job provisioner
///
/// Every call takes the namespace explicitly; implementations never cache
/// orchestrator state between calls.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Cluster name, used for logging
    fn name(&self) -> &str;

    /// Namespace holding every object of the given pool
    fn pool_namespace(&self, pool: &str) -> String;

    async fn create_cron_job(&self, namespace: &str, cron_job: &CronJob)
        -> Result<CronJob, ClusterError>;

    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<CronJob, ClusterError>;

    /// Full replace of an existing scheduled job
    async fn update_cron_job(&self, namespace: &str, cron_job: &CronJob)
        -> Result<CronJob, ClusterError>;

    async fn delete_cron_job(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError>;

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Job, ClusterError>;

    async fn list_jobs(&self, namespace: &str, label_selector: &str)
        -> Result<Vec<Job>, ClusterError>;

    async fn list_pods(&self, namespace: &str, label_selector: &str)
        -> Result<Vec<Pod>, ClusterError>;

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceAccount, ClusterError>;

    async fn create_service_account(
        &self,
        namespace: &str,
        service_account: &ServiceAccount,
    ) -> Result<ServiceAccount, ClusterError>;

    async fn update_service_account(
        &self,
        namespace: &str,
        service_account: &ServiceAccount,
    ) -> Result<ServiceAccount, ClusterError>;

    async fn delete_service_account(&self, namespace: &str, name: &str)
        -> Result<(), ClusterError>;
}

/// Resolves a pool to the cluster client serving it
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    async fn cluster_for_pool(&self, pool: &str) -> Result<Arc<dyn ClusterClient>, ClusterError>;
}

/// Maps pools to namespaces inside one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePolicy {
    /// When not empty, pools live in `<prefix>-<pool>`.
    #[serde(default)]
    pub prefix: String,
    pub default_namespace: String,
    /// Explicit per-pool namespaces, checked first.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl NamespacePolicy {
    pub fn new(default_namespace: impl Into<String>) -> Self {
        Self {
            prefix: String::new(),
            default_namespace: default_namespace.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_override(mut self, pool: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.overrides.insert(pool.into(), namespace.into());
        self
    }

    pub fn namespace_for(&self, pool: &str) -> String {
        if let Some(namespace) = self.overrides.get(pool) {
            return namespace.clone();
        }
        if self.prefix.is_empty() || pool.is_empty() {
            return self.default_namespace.clone();
        }
        format!("{}-{}", self.prefix, pool)
    }
}
