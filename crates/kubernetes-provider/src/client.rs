//! Kubernetes API backed cluster client

use async_trait::async_trait;
use cronpilot_ports::{ClusterClient, ClusterError, NamespacePolicy};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// One Kubernetes cluster reached through `kube::Client`
#[derive(Clone)]
pub struct KubeCluster {
    name: String,
    client: kube::Client,
    namespaces: NamespacePolicy,
}

impl KubeCluster {
    pub fn new(
        name: impl Into<String>,
        client: kube::Client,
        namespaces: NamespacePolicy,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            namespaces,
        }
    }

    pub fn kube_client(&self) -> &kube::Client {
        &self.client
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Maps API status codes onto the port's error classes
pub fn map_kube_error(kind: &str, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => ClusterError::not_found(kind, name),
            409 if response.reason == "AlreadyExists" => ClusterError::already_exists(kind, name),
            409 => ClusterError::Conflict(response.message),
            _ => ClusterError::Transport(format!(
                "{} {}: {}",
                response.code, response.reason, response.message
            )),
        },
        other => ClusterError::Transport(other.to_string()),
    }
}

fn object_name<K: Resource>(object: &K) -> String {
    object.meta().name.clone().unwrap_or_default()
}

async fn create<K>(api: &Api<K>, kind: &str, object: &K) -> Result<K, ClusterError>
where
    K: Resource + Clone + DeserializeOwned + serde::Serialize + Debug,
{
    api.create(&PostParams::default(), object)
        .await
        .map_err(|e| map_kube_error(kind, &object_name(object), e))
}

async fn replace<K>(api: &Api<K>, kind: &str, object: &K) -> Result<K, ClusterError>
where
    K: Resource + Clone + DeserializeOwned + serde::Serialize + Debug,
{
    let name = object_name(object);
    api.replace(&name, &PostParams::default(), object)
        .await
        .map_err(|e| map_kube_error(kind, &name, e))
}

async fn delete<K>(api: &Api<K>, kind: &str, name: &str) -> Result<(), ClusterError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.delete(name, &DeleteParams::background())
        .await
        .map(|_| ())
        .map_err(|e| map_kube_error(kind, name, e))
}

#[async_trait]
impl ClusterClient for KubeCluster {
    fn name(&self) -> &str {
        &self.name
    }

    fn pool_namespace(&self, pool: &str) -> String {
        self.namespaces.namespace_for(pool)
    }

    async fn create_cron_job(
        &self,
        namespace: &str,
        cron_job: &CronJob,
    ) -> Result<CronJob, ClusterError> {
        create(&self.api(namespace), "CronJob", cron_job).await
    }

    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<CronJob, ClusterError> {
        self.api::<CronJob>(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error("CronJob", name, e))
    }

    async fn update_cron_job(
        &self,
        namespace: &str,
        cron_job: &CronJob,
    ) -> Result<CronJob, ClusterError> {
        replace(&self.api(namespace), "CronJob", cron_job).await
    }

    async fn delete_cron_job(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        delete::<CronJob>(&self.api(namespace), "CronJob", name).await
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        create(&self.api(namespace), "Job", job).await
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Job, ClusterError> {
        self.api::<Job>(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error("Job", name, e))
    }

    async fn list_jobs(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Job>, ClusterError> {
        self.api::<Job>(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await
            .map(|list| list.items)
            .map_err(|e| map_kube_error("Job", label_selector, e))
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, ClusterError> {
        self.api::<Pod>(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await
            .map(|list| list.items)
            .map_err(|e| map_kube_error("Pod", label_selector, e))
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceAccount, ClusterError> {
        self.api::<ServiceAccount>(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error("ServiceAccount", name, e))
    }

    async fn create_service_account(
        &self,
        namespace: &str,
        service_account: &ServiceAccount,
    ) -> Result<ServiceAccount, ClusterError> {
        create(&self.api(namespace), "ServiceAccount", service_account).await
    }

    async fn update_service_account(
        &self,
        namespace: &str,
        service_account: &ServiceAccount,
    ) -> Result<ServiceAccount, ClusterError> {
        replace(&self.api(namespace), "ServiceAccount", service_account).await
    }

    async fn delete_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        delete::<ServiceAccount>(&self.api(namespace), "ServiceAccount", name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} message"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_map_kube_error() {
        assert_eq!(
            map_kube_error("CronJob", "mailer", api_error(404, "NotFound")),
            ClusterError::not_found("CronJob", "mailer")
        );
        assert_eq!(
            map_kube_error("Job", "mailer-manual-job-2", api_error(409, "AlreadyExists")),
            ClusterError::already_exists("Job", "mailer-manual-job-2")
        );
        assert_eq!(
            map_kube_error("CronJob", "mailer", api_error(409, "Conflict")),
            ClusterError::Conflict("Conflict message".to_string())
        );
        assert!(matches!(
            map_kube_error("CronJob", "mailer", api_error(500, "InternalError")),
            ClusterError::Transport(_)
        ));
    }
}
