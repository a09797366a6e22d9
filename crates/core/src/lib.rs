//! Domain Core - Platform Job Model
//!
//! This crate contains the platform-level description of a job, the unit
//! read model projected from orchestrator executions, the audit descriptors
//! written for execution lifecycle events, and the pure helpers that derive
//! labels and names from a job.

pub mod audit;
pub mod clock;
pub mod error;
pub mod job;
pub mod labels;
pub mod unit;

pub use crate::audit::{
    Allowed, AuditEventOpts, ContextType, Owner, OwnerType, PermissionContext, PermissionScheme,
    Target, TargetType,
};
pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::error::DomainError;
pub use crate::job::{ContainerInfo, EnvVar, Job, JobMetadata, JobSpec, MetadataItem, Plan};
pub use crate::unit::{Unit, UnitStatus};
pub use chrono::{DateTime, Utc};

/// Result type for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;
