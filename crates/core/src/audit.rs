//! Audit event descriptors
//!
//! These are the fields this layer must populate when it reports an
//! execution lifecycle event to the platform's event store. Persistence and
//! authorization of the records belong to the audit subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission a recorded event is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionScheme {
    #[serde(rename = "job.create")]
    JobCreate,
    #[serde(rename = "job.run")]
    JobRun,
    #[serde(rename = "job.read.events")]
    JobReadEvents,
}

impl PermissionScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionScheme::JobCreate => "job.create",
            PermissionScheme::JobRun => "job.run",
            PermissionScheme::JobReadEvents => "job.read.events",
        }
    }
}

impl fmt::Display for PermissionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Job,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub value: String,
}

impl Target {
    pub fn job(name: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Job,
            value: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Global,
    Job,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionContext {
    pub ctx_type: ContextType,
    pub value: String,
}

impl PermissionContext {
    pub fn job(name: impl Into<String>) -> Self {
        Self {
            ctx_type: ContextType::Job,
            value: name.into(),
        }
    }
}

/// Who may read the recorded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowed {
    pub scheme: PermissionScheme,
    pub contexts: Vec<PermissionContext>,
}

impl Allowed {
    pub fn new(scheme: PermissionScheme, contexts: Vec<PermissionContext>) -> Self {
        Self { scheme, contexts }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    User,
    Token,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "type")]
    pub owner_type: OwnerType,
    #[serde(default)]
    pub name: String,
}

impl Owner {
    pub fn internal() -> Self {
        Self {
            owner_type: OwnerType::Internal,
            name: String::new(),
        }
    }
}

/// Options used to open an audit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEventOpts {
    pub kind: PermissionScheme,
    pub target: Target,
    pub allowed: Allowed,
    pub owner: Owner,
    pub cancelable: bool,
}

impl AuditEventOpts {
    /// Internally owned, non-cancelable event about a job, readable by
    /// whoever may read that job's events.
    pub fn for_job(kind: PermissionScheme, job_name: &str) -> Self {
        Self {
            kind,
            target: Target::job(job_name),
            allowed: Allowed::new(
                PermissionScheme::JobReadEvents,
                vec![PermissionContext::job(job_name)],
            ),
            owner: Owner::internal(),
            cancelable: false,
        }
    }
}
