//! Kubernetes provisioner for cronpilot jobs
//!
//! Every platform job is backed by one CronJob in the namespace of its pool.
//! Manual jobs are suspended CronJobs that only run when triggered. Pods of
//! an execution run under a per-job service account.
//!
//! Features:
//! - CronJob create, update and destroy
//! - Manual runs spawned from the CronJob template
//! - Execution units with status and restart counts
//! - Job lifecycle events forwarded to the audit trail

pub mod client;
pub mod events;
pub mod identity;
pub mod lifecycle;
pub mod metadata;
pub mod metrics;
pub mod spec;
pub mod trigger;
pub mod units;
pub mod watcher;

pub use client::{map_kube_error, KubeCluster};
pub use events::{JobEventBridge, JobEventReason};
pub use identity::ServiceAccountProvisioner;
pub use lifecycle::KubernetesJobProvisioner;
pub use metrics::{bridge_metrics, BridgeMetrics};
pub use watcher::{process_event, EventWatcher};

/// Provisioner name stamped on the resources this crate creates
pub const PROVISIONER_NAME: &str = "kubernetes";
