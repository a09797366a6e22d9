//! Execution reconciliation into platform units

use crate::lifecycle::KubernetesJobProvisioner;
use cronpilot_core::labels::job_labels;
use cronpilot_core::{Job, Unit, UnitStatus};
use cronpilot_ports::{ClusterClient, ClusterStep, ProvisionError};
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::api::core::v1 as corev1;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Label the job controller puts on every pod of an execution.
pub const EXECUTION_POD_LABEL: &str = "job-name";

/// Renders `k=v` pairs as an equality-based label selector.
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn execution_pod_selector(execution: &str) -> String {
    format!("{EXECUTION_POD_LABEL}={execution}")
}

/// Failure dominates success: any failed attempt reports Error.
pub fn execution_status(status: Option<&batchv1::JobStatus>) -> UnitStatus {
    let (failed, succeeded) = status
        .map(|s| (s.failed.unwrap_or(0), s.succeeded.unwrap_or(0)))
        .unwrap_or((0, 0));
    UnitStatus::from_counts(failed, succeeded)
}

pub fn pod_restarts(pod: &corev1::Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(|c| c.restart_count).sum())
        .unwrap_or(0)
}

async fn execution_unit(
    client: &dyn ClusterClient,
    namespace: &str,
    execution: &batchv1::Job,
) -> Result<Unit, ProvisionError> {
    let name = execution.metadata.name.clone().unwrap_or_default();
    let pod_namespace = execution.metadata.namespace.as_deref().unwrap_or(namespace);
    let pods = client
        .list_pods(pod_namespace, &execution_pod_selector(&name))
        .await
        .map_err(|e| ProvisionError::cluster(ClusterStep::ListPods, e))?;

    let restarts = pods.iter().map(pod_restarts).sum();
    let created_at = execution
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0);

    Ok(Unit {
        id: name.clone(),
        name,
        status: execution_status(execution.status.as_ref()),
        restarts,
        created_at,
    })
}

impl KubernetesJobProvisioner {
    #[instrument(skip_all, fields(job = %job.name, pool = %job.pool))]
    pub(crate) async fn list_units(&self, job: &Job) -> Result<Vec<Unit>, ProvisionError> {
        let client = self.cluster_for_pool(&job.pool).await?;
        let namespace = client.pool_namespace(&job.pool);
        let executions = client
            .list_jobs(&namespace, &label_selector(&job_labels(job)))
            .await
            .map_err(|e| ProvisionError::cluster(ClusterStep::ListExecutions, e))?;

        let mut units = Vec::with_capacity(executions.len());
        for execution in &executions {
            units.push(execution_unit(client.as_ref(), &namespace, execution).await?);
        }
        debug!(units = units.len(), "units listed");
        Ok(units)
    }
}
