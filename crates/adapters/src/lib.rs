//! Adapters - Infrastructure Implementations
//!
//! Implementations of the ports defined in cronpilot-ports that do not talk
//! to Kubernetes directly, plus process configuration and logging.

pub mod audit;
pub mod cluster;
pub mod config;
pub mod logging;
pub mod resources;

pub use crate::audit::{EventOutcome, InMemoryAuditSink, RecordedEvent, TracingAuditSink};
pub use crate::cluster::{ClusterOp, InMemoryCluster, StaticClusterResolver};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::logging::{init_logging, LogFormat, LoggingError};
pub use crate::resources::PlanResourceResolver;
