//! Ports - Abstraction Layer
//!
//! This crate defines the contracts (traits) the job provisioner consumes
//! from its collaborators and the surface it offers to the platform. They
//! are implemented by the kubernetes provider and by the adapters crate.

pub mod audit;
pub mod cluster;
pub mod identity;
pub mod provisioner;
pub mod resources;

pub use crate::audit::{AuditError, AuditEventId, AuditSink};
pub use crate::cluster::{ClusterClient, ClusterError, ClusterResolver, NamespacePolicy};
pub use crate::identity::{IdentityError, IdentityProvisioner};
pub use crate::provisioner::{ClusterStep, JobProvisioner, ProvisionError};
pub use crate::resources::{ResourceError, ResourceRequirementResolver};
