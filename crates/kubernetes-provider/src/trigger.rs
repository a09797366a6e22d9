//! Manual CronJob runs
//!
//! A manual run copies the CronJob's job template into a standalone Job
//! owned by the CronJob. Its name only has minute granularity: two triggers
//! in the same wall-clock minute collide at the orchestrator, and the second
//! one is reported as already pending instead of being retried.

use crate::lifecycle::KubernetesJobProvisioner;
use crate::metrics::bridge_metrics;
use cronpilot_ports::{ClusterStep, ProvisionError};
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::{info, instrument, warn};

pub const INSTANTIATE_ANNOTATION: &str = "cronjob.kubernetes.io/instantiate";
pub const INSTANTIATE_MANUAL: &str = "manual";

pub const CRON_JOB_KIND: &str = "CronJob";
pub const BATCH_API_VERSION: &str = "batch/v1";

/// `<schedule>-manual-job-<unix minute>`
pub fn manual_job_name(schedule: &str, unix_seconds: i64) -> String {
    format!("{}-manual-job-{}", schedule, unix_seconds / 60)
}

/// Builds the one-off Job for a CronJob; labels, annotations, namespace and
/// template are copied verbatim.
pub fn manual_job_from(cron_job: &batchv1::CronJob, name: String) -> batchv1::Job {
    let mut annotations = cron_job.metadata.annotations.clone().unwrap_or_default();
    annotations.insert(
        INSTANTIATE_ANNOTATION.to_string(),
        INSTANTIATE_MANUAL.to_string(),
    );

    let owner = OwnerReference {
        api_version: BATCH_API_VERSION.to_string(),
        kind: CRON_JOB_KIND.to_string(),
        name: cron_job.metadata.name.clone().unwrap_or_default(),
        uid: cron_job.metadata.uid.clone().unwrap_or_default(),
        ..Default::default()
    };

    batchv1::Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: cron_job.metadata.namespace.clone(),
            labels: cron_job.metadata.labels.clone(),
            annotations: Some(annotations),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: cron_job
            .spec
            .as_ref()
            .and_then(|spec| spec.job_template.spec.clone()),
        status: None,
    }
}

impl KubernetesJobProvisioner {
    #[instrument(skip(self))]
    pub(crate) async fn trigger(&self, name: &str, pool: &str) -> Result<(), ProvisionError> {
        let client = self.cluster_for_pool(pool).await?;
        let namespace = client.pool_namespace(pool);

        let cron_job = client
            .get_cron_job(&namespace, name)
            .await
            .map_err(|e| ProvisionError::cluster(ClusterStep::GetSchedule, e))?;

        let execution = manual_job_name(name, self.clock.now().timestamp());
        let job = manual_job_from(&cron_job, execution.clone());
        let target_namespace = job.metadata.namespace.clone().unwrap_or(namespace);

        match client.create_job(&target_namespace, &job).await {
            Ok(_) => {
                bridge_metrics().record_trigger("created");
                info!(%execution, namespace = %target_namespace, "manual run created");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                bridge_metrics().record_trigger("pending");
                warn!(%execution, "manual run already pending for this minute");
                Err(ProvisionError::TriggerPending {
                    schedule: name.to_string(),
                    execution,
                })
            }
            Err(e) => {
                bridge_metrics().record_trigger("failed");
                Err(ProvisionError::cluster(ClusterStep::CreateExecution, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn cron_job(annotations: Option<BTreeMap<String, String>>) -> batchv1::CronJob {
        batchv1::CronJob {
            metadata: ObjectMeta {
                name: Some("foo".to_string()),
                namespace: Some("cronpilot-p1".to_string()),
                uid: Some("0b5c7e1a".to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), "foo".to_string())])),
                annotations,
                ..Default::default()
            },
            spec: Some(batchv1::CronJobSpec {
                schedule: "* * * * *".to_string(),
                job_template: batchv1::JobTemplateSpec {
                    metadata: None,
                    spec: Some(batchv1::JobSpec {
                        backoff_limit: Some(2),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }

    #[test]
    fn test_manual_job_name_minute_window() {
        assert_eq!(manual_job_name("foo", 120), "foo-manual-job-2");
        assert_eq!(manual_job_name("foo", 121), manual_job_name("foo", 120));
        assert_eq!(manual_job_name("foo", 179), "foo-manual-job-2");
        assert_eq!(manual_job_name("foo", 180), "foo-manual-job-3");
    }

    #[test]
    fn test_manual_job_copies_template() {
        let job = manual_job_from(&cron_job(None), "foo-manual-job-2".to_string());
        assert_eq!(job.metadata.name.as_deref(), Some("foo-manual-job-2"));
        assert_eq!(job.metadata.namespace.as_deref(), Some("cronpilot-p1"));
        assert_eq!(job.metadata.labels.as_ref().unwrap()["app"], "foo");
        assert_eq!(job.spec.as_ref().unwrap().backoff_limit, Some(2));

        let owners = job.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "CronJob");
        assert_eq!(owners[0].name, "foo");
        assert_eq!(owners[0].uid, "0b5c7e1a");
        assert_eq!(owners[0].api_version, "batch/v1");
    }

    #[test]
    fn test_manual_annotation_added() {
        let job = manual_job_from(&cron_job(None), "foo-manual-job-2".to_string());
        let annotations = job.metadata.annotations.unwrap();
        assert_eq!(annotations[INSTANTIATE_ANNOTATION], "manual");

        let existing = BTreeMap::from([("owner".to_string(), "ops".to_string())]);
        let job = manual_job_from(&cron_job(Some(existing)), "foo-manual-job-2".to_string());
        let annotations = job.metadata.annotations.unwrap();
        assert_eq!(annotations["owner"], "ops");
        assert_eq!(annotations[INSTANTIATE_ANNOTATION], "manual");
    }
}
