//! Error types for the job domain

use thiserror::Error;

/// Errors raised while validating a platform job
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid job name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid schedule {schedule:?}: {reason}")]
    InvalidSchedule { schedule: String, reason: String },
}

impl DomainError {
    pub fn invalid_name(name: &str, reason: &str) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_schedule(schedule: &str, reason: &str) -> Self {
        Self::InvalidSchedule {
            schedule: schedule.to_string(),
            reason: reason.to_string(),
        }
    }
}
