//! Job Provisioner Port
//!
//! The surface the rest of the platform calls to manage the orchestrator
//! side of a job. Errors name the sub-step that failed so callers can tell
//! a bad job definition from an unavailable cluster or a duplicate.

use crate::cluster::ClusterError;
use crate::identity::IdentityError;
use crate::resources::ResourceError;
use async_trait::async_trait;
use cronpilot_core::{DomainError, Job, Unit};
use std::fmt;

/// Orchestrator call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStep {
    CreateSchedule,
    GetSchedule,
    UpdateSchedule,
    DeleteSchedule,
    DeleteIdentity,
    CreateExecution,
    ListExecutions,
    ListPods,
}

impl fmt::Display for ClusterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            ClusterStep::CreateSchedule => "create cronjob",
            ClusterStep::GetSchedule => "get cronjob",
            ClusterStep::UpdateSchedule => "update cronjob",
            ClusterStep::DeleteSchedule => "delete cronjob",
            ClusterStep::DeleteIdentity => "delete service account",
            ClusterStep::CreateExecution => "create job",
            ClusterStep::ListExecutions => "list jobs",
            ClusterStep::ListPods => "list pods",
        };
        f.write_str(step)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProvisionError {
    #[error("invalid job: {0}")]
    InvalidJob(#[from] DomainError),

    #[error("unable to resolve cluster for pool {pool}: {source}")]
    Resolve {
        pool: String,
        #[source]
        source: ClusterError,
    },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("unable to compile job spec: {0}")]
    Compile(#[from] ResourceError),

    #[error("{step} failed: {source}")]
    Cluster {
        step: ClusterStep,
        #[source]
        source: ClusterError,
    },

    #[error("a manual run of {schedule} is already pending as {execution}")]
    TriggerPending { schedule: String, execution: String },
}

impl ProvisionError {
    pub fn cluster(step: ClusterStep, source: ClusterError) -> Self {
        Self::Cluster { step, source }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Resolve { source, .. } | Self::Cluster { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Cluster { source, .. } => source.is_already_exists(),
            Self::TriggerPending { .. } => true,
            _ => false,
        }
    }

    pub fn is_trigger_pending(&self) -> bool {
        matches!(self, Self::TriggerPending { .. })
    }
}

/// Orchestrator-side lifecycle of platform jobs
#[async_trait]
pub trait JobProvisioner: Send + Sync {
    /// Submits the scheduled job and returns its name
    async fn create_job(&self, job: &Job) -> Result<String, ProvisionError>;

    /// Full replace of the scheduled job; never creates
    async fn update_job(&self, job: &Job) -> Result<(), ProvisionError>;

    /// Runs the schedule once, outside of its timer
    async fn trigger_cron(&self, name: &str, pool: &str) -> Result<(), ProvisionError>;

    async fn job_units(&self, job: &Job) -> Result<Vec<Unit>, ProvisionError>;

    async fn destroy_job(&self, job: &Job) -> Result<(), ProvisionError>;
}
