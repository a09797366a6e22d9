//! Resource requirement resolution

use cronpilot_core::Job;
use k8s_openapi::api::core::v1::ResourceRequirements;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("invalid plan {plan:?}: {reason}")]
    InvalidPlan { plan: String, reason: String },

    #[error("invalid overcommit factor for {resource}: {factor}")]
    InvalidOvercommit { resource: String, factor: f64 },
}

/// Computes container resource limits and requests for a job
pub trait ResourceRequirementResolver: Send + Sync {
    fn resolve(&self, job: &Job) -> Result<ResourceRequirements, ResourceError>;
}
