//! CronJob lifecycle
//!
//! Create, update and destroy of the scheduled job backing a platform job.
//! The CronJob is always rebuilt from the job; there is no partial patch and
//! no upsert. Duplicate creates and missing updates surface as errors.

use crate::metadata::build_metadata;
use crate::spec::build_job_spec;
use crate::PROVISIONER_NAME;
use async_trait::async_trait;
use cronpilot_core::labels::{service_account_labels, service_account_name_for_job};
use cronpilot_core::{Clock, Job, SystemClock, Unit};
use cronpilot_ports::{
    ClusterClient, ClusterResolver, ClusterStep, IdentityProvisioner, JobProvisioner,
    ProvisionError, ResourceError, ResourceRequirementResolver,
};
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Job provisioner backed by Kubernetes CronJobs
pub struct KubernetesJobProvisioner {
    clusters: Arc<dyn ClusterResolver>,
    resources: Arc<dyn ResourceRequirementResolver>,
    identity: Arc<dyn IdentityProvisioner>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl KubernetesJobProvisioner {
    pub fn new(
        clusters: Arc<dyn ClusterResolver>,
        resources: Arc<dyn ResourceRequirementResolver>,
        identity: Arc<dyn IdentityProvisioner>,
    ) -> Self {
        Self {
            clusters,
            resources,
            identity,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock used for manual trigger names
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) async fn cluster_for_pool(
        &self,
        pool: &str,
    ) -> Result<Arc<dyn ClusterClient>, ProvisionError> {
        self.clusters
            .cluster_for_pool(pool)
            .await
            .map_err(|source| ProvisionError::Resolve {
                pool: pool.to_string(),
                source,
            })
    }

    /// Compiles the full CronJob for a job. Pure: nothing is sent anywhere.
    ///
    /// The job template carries the same labels as the CronJob, so executions
    /// started by the schedule are found by the units selector.
    pub fn build_cron_job(
        &self,
        job: &Job,
        namespace: &str,
    ) -> Result<batchv1::CronJob, ResourceError> {
        let (labels, annotations) = build_metadata(job);
        let job_spec = build_job_spec(job, self.resources.as_ref(), &labels, &annotations)?;

        Ok(batchv1::CronJob {
            metadata: ObjectMeta {
                name: Some(job.name.clone()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels.clone()),
                annotations: Some(annotations.clone()),
                ..Default::default()
            },
            spec: Some(batchv1::CronJobSpec {
                schedule: job.spec.schedule.clone(),
                suspend: Some(job.spec.manual),
                job_template: batchv1::JobTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        annotations: Some(annotations),
                        ..Default::default()
                    }),
                    spec: Some(job_spec),
                },
                ..Default::default()
            }),
            status: None,
        })
    }

    async fn ensure_service_account(
        &self,
        client: &dyn ClusterClient,
        job: &Job,
        namespace: &str,
    ) -> Result<(), ProvisionError> {
        let labels = service_account_labels(job, PROVISIONER_NAME);
        let name = service_account_name_for_job(job);
        self.identity
            .ensure(client, &name, &labels, namespace, &job.metadata)
            .await?;
        Ok(())
    }

    /// Shared by create and update. Compilation happens before any cluster
    /// write, so a bad plan never leaves a half-provisioned job behind.
    async fn prepare(
        &self,
        job: &Job,
    ) -> Result<(Arc<dyn ClusterClient>, String, batchv1::CronJob), ProvisionError> {
        job.validate()?;
        let client = self.cluster_for_pool(&job.pool).await?;
        let namespace = client.pool_namespace(&job.pool);
        let cron_job = self.build_cron_job(job, &namespace)?;
        self.ensure_service_account(client.as_ref(), job, &namespace)
            .await?;
        Ok((client, namespace, cron_job))
    }
}

#[async_trait]
impl JobProvisioner for KubernetesJobProvisioner {
    #[instrument(skip_all, fields(job = %job.name, pool = %job.pool))]
    async fn create_job(&self, job: &Job) -> Result<String, ProvisionError> {
        let (client, namespace, cron_job) = self.prepare(job).await?;
        let created = client
            .create_cron_job(&namespace, &cron_job)
            .await
            .map_err(|e| ProvisionError::cluster(ClusterStep::CreateSchedule, e))?;

        let name = created.metadata.name.unwrap_or_else(|| job.name.clone());
        info!(cluster = client.name(), %namespace, cronjob = %name, "cronjob created");
        Ok(name)
    }

    #[instrument(skip_all, fields(job = %job.name, pool = %job.pool))]
    async fn update_job(&self, job: &Job) -> Result<(), ProvisionError> {
        let (client, namespace, cron_job) = self.prepare(job).await?;
        client
            .update_cron_job(&namespace, &cron_job)
            .await
            .map_err(|e| ProvisionError::cluster(ClusterStep::UpdateSchedule, e))?;

        info!(
            cluster = client.name(),
            %namespace,
            suspended = job.spec.manual,
            "cronjob updated"
        );
        Ok(())
    }

    async fn trigger_cron(&self, name: &str, pool: &str) -> Result<(), ProvisionError> {
        self.trigger(name, pool).await
    }

    async fn job_units(&self, job: &Job) -> Result<Vec<Unit>, ProvisionError> {
        self.list_units(job).await
    }

    /// Running executions are left to the orchestrator's garbage collector.
    #[instrument(skip_all, fields(job = %job.name, pool = %job.pool))]
    async fn destroy_job(&self, job: &Job) -> Result<(), ProvisionError> {
        let client = self.cluster_for_pool(&job.pool).await?;
        let namespace = client.pool_namespace(&job.pool);

        let account = service_account_name_for_job(job);
        match client.delete_service_account(&namespace, &account).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(%namespace, service_account = %account, "service account already gone");
            }
            Err(e) => return Err(ProvisionError::cluster(ClusterStep::DeleteIdentity, e)),
        }

        client
            .delete_cron_job(&namespace, &job.name)
            .await
            .map_err(|e| ProvisionError::cluster(ClusterStep::DeleteSchedule, e))?;

        info!(cluster = client.name(), %namespace, "cronjob destroyed");
        Ok(())
    }
}
