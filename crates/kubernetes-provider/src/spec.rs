//! Job template compilation
//!
//! Pure translation of a platform job into the batch/v1 job spec embedded in
//! its CronJob. Identical inputs always compile to identical specs.

use cronpilot_core::labels::service_account_name_for_job;
use cronpilot_core::{EnvVar, Job};
use cronpilot_ports::{ResourceError, ResourceRequirementResolver};
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

pub const JOB_CONTAINER_NAME: &str = "job";

/// Used when the job sets no deadline or a zero deadline.
pub const DEFAULT_ACTIVE_DEADLINE_SECONDS: i64 = 60 * 60;

/// Finished executions are kept for a day; their output lives in the log
/// store, so the cluster copy is disposable.
pub const TTL_SECONDS_AFTER_FINISHED: i32 = 86_400;

pub const RESTART_POLICY: &str = "OnFailure";

pub fn build_job_spec(
    job: &Job,
    resources: &dyn ResourceRequirementResolver,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Result<batchv1::JobSpec, ResourceError> {
    let spec = &job.spec;
    let requirements = resources.resolve(job)?;

    let envs: Vec<corev1::EnvVar> = spec
        .envs
        .iter()
        .chain(spec.service_envs.iter())
        .map(to_container_env)
        .collect();

    Ok(batchv1::JobSpec {
        parallelism: spec.parallelism,
        completions: spec.completions,
        backoff_limit: spec.backoff_limit,
        active_deadline_seconds: Some(active_deadline(spec.active_deadline_seconds)),
        ttl_seconds_after_finished: Some(TTL_SECONDS_AFTER_FINISHED),
        template: corev1::PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                annotations: Some(annotations.clone()),
                ..Default::default()
            }),
            spec: Some(corev1::PodSpec {
                restart_policy: Some(RESTART_POLICY.to_string()),
                service_account_name: Some(service_account_name_for_job(job)),
                containers: vec![corev1::Container {
                    name: JOB_CONTAINER_NAME.to_string(),
                    image: Some(spec.container.image().to_string()),
                    command: Some(spec.container.command.clone()),
                    resources: Some(requirements),
                    env: Some(envs),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        },
        ..Default::default()
    })
}

pub fn active_deadline(seconds: Option<i64>) -> i64 {
    match seconds {
        None | Some(0) => DEFAULT_ACTIVE_DEADLINE_SECONDS,
        Some(seconds) => seconds,
    }
}

/// Values are literals; `$` is doubled so the kubelet does not expand
/// `$(VAR)` references inside them.
pub fn escape_env_value(value: &str) -> String {
    value.replace('$', "$$")
}

fn to_container_env(env: &EnvVar) -> corev1::EnvVar {
    corev1::EnvVar {
        name: env.name.clone(),
        value: Some(escape_env_value(&env.value)),
        ..Default::default()
    }
}
