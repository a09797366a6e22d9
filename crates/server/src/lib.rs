//! cronpilot server: job event watcher and metrics endpoint

pub mod bootstrap;
pub mod metrics_api;
