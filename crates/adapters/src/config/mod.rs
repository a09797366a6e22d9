pub mod app_config;


pub use app_config::{
    AppConfig, AuditConfig, ClusterConfig, ConfigError, K8sGlobalConfig, LoggingConfig,
    MetricsConfig, PoolConfig, ResourceConfig,
};
