//! Job Domain Entity
//!
//! A job is a named workload owned by the platform's job registry: a
//! container image, a command, resource hints taken from its plan and an
//! optional recurring schedule. The orchestrator-side resources are always
//! re-derived from this description; nothing here talks to a cluster.

use crate::error::DomainError;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Maximum length accepted by the orchestrator for scheduled-job names.
pub const MAX_JOB_NAME_LEN: usize = 52;

/// Job aggregate as registered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub team_owner: Option<String>,
    /// Logical placement group; resolves to one cluster and one namespace.
    pub pool: String,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub metadata: JobMetadata,
    pub spec: JobSpec,
}

/// Execution settings of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub completions: Option<i32>,
    pub parallelism: Option<i32>,
    pub active_deadline_seconds: Option<i64>,
    pub backoff_limit: Option<i32>,
    pub schedule: String,
    /// When set the schedule is suspended and the job only runs on demand.
    #[serde(default)]
    pub manual: bool,
    pub container: ContainerInfo,
    #[serde(default)]
    pub envs: Vec<EnvVar>,
    /// Variables injected by bound services.
    #[serde(default)]
    pub service_envs: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    /// Reference mirrored into the internal registry, empty when not mirrored.
    #[serde(default)]
    pub internal_registry_image: String,
    pub original_image_src: String,
    #[serde(default)]
    pub command: Vec<String>,
}

impl ContainerInfo {
    /// Image to run: the internal mirror when present, the source otherwise.
    pub fn image(&self) -> &str {
        if self.internal_registry_image.is_empty() {
            &self.original_image_src
        } else {
            &self.internal_registry_image
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Resource plan assigned to a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub name: String,
    /// Memory limit in bytes, 0 means unlimited.
    #[serde(default)]
    pub memory: i64,
    /// CPU limit in millicores, 0 means unlimited.
    #[serde(default)]
    pub cpu_milli: i64,
}

/// User supplied labels and annotations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub labels: Vec<MetadataItem>,
    #[serde(default)]
    pub annotations: Vec<MetadataItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub name: String,
    pub value: String,
}

impl MetadataItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Job {
    /// Check that the job can be expressed as orchestrator objects
    ///
    /// # Errors
    /// Returns `DomainError` when the name, pool or schedule is unusable
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.pool.trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "job {} has no pool",
                self.name
            )));
        }
        if self.spec.container.image().is_empty() {
            return Err(DomainError::Validation(format!(
                "job {} has no image",
                self.name
            )));
        }
        validate_schedule(&self.spec.schedule)
    }
}

/// Descriptors understood by the CronJob controller in place of 5 fields.
pub const SCHEDULE_DESCRIPTORS: &[&str] = &[
    "@yearly", "@annually", "@monthly", "@weekly", "@daily", "@midnight", "@hourly",
];

/// Shape check only: an optional `CRON_TZ=`/`TZ=` prefix, then 5 fields, a
/// descriptor or `@every <duration>`. Field values are left to the API server.
fn validate_schedule(schedule: &str) -> Result<()> {
    let mut tokens: Vec<&str> = schedule.split_whitespace().collect();
    if let Some(&first) = tokens.first() {
        if let Some(zone) = first
            .strip_prefix("CRON_TZ=")
            .or_else(|| first.strip_prefix("TZ="))
        {
            if zone.is_empty() {
                return Err(DomainError::invalid_schedule(schedule, "empty time zone"));
            }
            tokens.remove(0);
        }
    }

    match tokens.as_slice() {
        [] => Err(DomainError::invalid_schedule(schedule, "schedule is empty")),
        ["@every", _duration] => Ok(()),
        [descriptor] if descriptor.starts_with('@') => {
            if SCHEDULE_DESCRIPTORS.contains(descriptor) {
                Ok(())
            } else {
                Err(DomainError::invalid_schedule(
                    schedule,
                    &format!("unknown descriptor {descriptor}"),
                ))
            }
        }
        fields if fields.len() == 5 => Ok(()),
        fields => Err(DomainError::invalid_schedule(
            schedule,
            &format!("expected 5 fields, found {}", fields.len()),
        )),
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DomainError::invalid_name(name, "name is empty"));
    }
    if name.len() > MAX_JOB_NAME_LEN {
        return Err(DomainError::invalid_name(
            name,
            &format!("longer than {MAX_JOB_NAME_LEN} characters"),
        ));
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars {
        return Err(DomainError::invalid_name(
            name,
            "only lowercase letters, digits and '-' are allowed",
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(DomainError::invalid_name(
            name,
            "must start and end with a letter or digit",
        ));
    }
    Ok(())
}
