//! Platform-owned labels and names derived from a job

use crate::job::Job;
use std::collections::BTreeMap;

pub const LABEL_PREFIX: &str = "cronpilot.io/";

pub const LABEL_IS_CRONPILOT: &str = "cronpilot.io/is-cronpilot";
pub const LABEL_IS_JOB: &str = "cronpilot.io/is-job";
pub const LABEL_JOB_NAME: &str = "cronpilot.io/job-name";
pub const LABEL_JOB_POOL: &str = "cronpilot.io/job-pool";
pub const LABEL_JOB_TEAM: &str = "cronpilot.io/job-team";
pub const LABEL_IS_SERVICE_ACCOUNT: &str = "cronpilot.io/is-service-account";
pub const LABEL_PROVISIONER: &str = "cronpilot.io/provisioner";

/// Identity labels of a job.
///
/// They select the job's executions and are the keys user labels can never
/// override.
pub fn job_labels(job: &Job) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        (LABEL_IS_CRONPILOT.to_string(), "true".to_string()),
        (LABEL_IS_JOB.to_string(), "true".to_string()),
        (LABEL_JOB_NAME.to_string(), job.name.clone()),
        (LABEL_JOB_POOL.to_string(), job.pool.clone()),
    ]);
    if let Some(team) = job.team_owner.as_deref().filter(|t| !t.is_empty()) {
        labels.insert(LABEL_JOB_TEAM.to_string(), team.to_string());
    }
    labels
}

pub fn service_account_labels(job: &Job, provisioner: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_IS_CRONPILOT.to_string(), "true".to_string()),
        (LABEL_IS_SERVICE_ACCOUNT.to_string(), "true".to_string()),
        (LABEL_JOB_NAME.to_string(), job.name.clone()),
        (LABEL_PROVISIONER.to_string(), provisioner.to_string()),
    ])
}

pub fn service_account_name_for_job(job: &Job) -> String {
    format!("job-{}", job.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobMetadata, JobSpec, Plan};

    fn job(team: Option<&str>) -> Job {
        Job {
            name: "mailer".to_string(),
            team_owner: team.map(str::to_string),
            pool: "p1".to_string(),
            plan: Plan::default(),
            metadata: JobMetadata::default(),
            spec: JobSpec::default(),
        }
    }

    #[test]
    fn test_job_labels() {
        let labels = job_labels(&job(Some("ops")));
        assert_eq!(labels[LABEL_JOB_NAME], "mailer");
        assert_eq!(labels[LABEL_JOB_POOL], "p1");
        assert_eq!(labels[LABEL_JOB_TEAM], "ops");
        assert_eq!(labels[LABEL_IS_JOB], "true");
        assert!(labels.keys().all(|k| k.starts_with(LABEL_PREFIX)));
    }

    #[test]
    fn test_job_labels_without_team() {
        assert!(!job_labels(&job(None)).contains_key(LABEL_JOB_TEAM));
        assert!(!job_labels(&job(Some(""))).contains_key(LABEL_JOB_TEAM));
    }

    #[test]
    fn test_service_account_naming() {
        let j = job(None);
        assert_eq!(service_account_name_for_job(&j), "job-mailer");
        let labels = service_account_labels(&j, "kubernetes");
        assert_eq!(labels[LABEL_PROVISIONER], "kubernetes");
        assert_eq!(labels[LABEL_JOB_NAME], "mailer");
    }
}
