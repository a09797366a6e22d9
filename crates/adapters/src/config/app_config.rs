//! Unified Application Configuration
//!
//! Loaded from a YAML file (`CRONPILOT_CONFIG_PATH`), inline YAML
//! (`CRONPILOT_CONFIG_YAML`) or, when neither is set, from one environment
//! variable family per section.

use crate::logging::LogFormat;
use cronpilot_ports::NamespacePolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Unified application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Kubernetes clusters and namespace policy
    pub kubernetes: K8sGlobalConfig,

    /// Pool placement
    #[serde(default)]
    pub pools: Vec<PoolConfig>,

    /// Plan to resource requirement translation
    #[serde(default)]
    pub resources: ResourceConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Load configuration from environment and file
    pub fn load() -> Result<Self> {
        let config = match (
            std::env::var("CRONPILOT_CONFIG_PATH").ok(),
            std::env::var("CRONPILOT_CONFIG_YAML").ok(),
        ) {
            (Some(path), None) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path));
                }
                let content = std::fs::read_to_string(&path).map_err(ConfigError::FileRead)?;
                serde_yaml::from_str(&content).map_err(ConfigError::ParseYaml)?
            }
            (None, Some(yaml)) => serde_yaml::from_str(&yaml).map_err(ConfigError::ParseYaml)?,
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue(
                    "set only one of CRONPILOT_CONFIG_PATH and CRONPILOT_CONFIG_YAML".to_string(),
                ))
            }
            (None, None) => Self::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            kubernetes: K8sGlobalConfig::from_env()?,
            pools: PoolConfig::list_from_env()?,
            resources: ResourceConfig::from_env()?,
            audit: AuditConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            metrics: MetricsConfig::from_env()?,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.kubernetes.validate()?;
        self.resources.validate()?;
        self.logging.validate()?;

        let clusters: BTreeSet<&str> = self
            .kubernetes
            .clusters
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        let mut pools = BTreeSet::new();
        for pool in &self.pools {
            pool.validate()?;
            if !pools.insert(pool.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "pool {} is configured twice",
                    pool.name
                )));
            }
            if !clusters.contains(pool.cluster.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "pool {} references unknown cluster {}",
                    pool.name, pool.cluster
                )));
            }
        }
        Ok(())
    }

    /// Namespace policy of one cluster, with the per-pool overrides of the
    /// pools placed on it.
    pub fn namespace_policy(&self, cluster: &str) -> NamespacePolicy {
        let k8s = &self.kubernetes;
        self.pools
            .iter()
            .filter(|p| p.cluster == cluster)
            .filter_map(|p| p.namespace.as_ref().map(|ns| (p.name.as_str(), ns.as_str())))
            .fold(
                NamespacePolicy::new(&k8s.default_namespace).with_prefix(&k8s.namespace_prefix),
                |policy, (pool, namespace)| policy.with_override(pool, namespace),
            )
    }

    /// Namespaces holding the pools placed on `cluster`
    pub fn pool_namespaces(&self, cluster: &str) -> BTreeSet<String> {
        let policy = self.namespace_policy(cluster);
        self.pools
            .iter()
            .filter(|p| p.cluster == cluster)
            .map(|p| policy.namespace_for(&p.name))
            .collect()
    }
}

/// Kubernetes global configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct K8sGlobalConfig {
    /// Whether to skip TLS verification (for development only)
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Pool namespaces are `<prefix>-<pool>` when non-empty
    #[serde(default)]
    pub namespace_prefix: String,

    /// Namespace used when no prefix is configured
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    pub clusters: Vec<ClusterConfig>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl K8sGlobalConfig {
    pub fn from_env() -> Result<Self> {
        let insecure_skip_verify = std::env::var("CRONPILOT_K8S_INSECURE_SKIP_VERIFY")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|_| {
                ConfigError::InvalidValue("CRONPILOT_K8S_INSECURE_SKIP_VERIFY".to_string())
            })?;

        let namespace_prefix = std::env::var("CRONPILOT_K8S_NAMESPACE_PREFIX").unwrap_or_default();
        let default_namespace =
            std::env::var("CRONPILOT_K8S_DEFAULT_NAMESPACE").unwrap_or_else(|_| default_namespace());

        let cluster = ClusterConfig {
            name: std::env::var("CRONPILOT_K8S_CLUSTER").unwrap_or_else(|_| "default".to_string()),
            context: std::env::var("CRONPILOT_K8S_CONTEXT").ok(),
        };

        Ok(Self {
            insecure_skip_verify,
            namespace_prefix,
            default_namespace,
            clusters: vec![cluster],
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.clusters.is_empty() {
            return Err(ConfigError::InvalidValue(
                "at least one cluster must be configured".to_string(),
            ));
        }
        if self.default_namespace.is_empty() {
            return Err(ConfigError::InvalidValue(
                "default_namespace must not be empty".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        for cluster in &self.clusters {
            if cluster.name.is_empty() || !names.insert(cluster.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid or duplicated cluster name {:?}",
                    cluster.name
                )));
            }
        }
        if self.insecure_skip_verify {
            tracing::warn!("kubernetes TLS verification is disabled, for development only");
        }
        Ok(())
    }
}

/// One cluster reachable through the local kubeconfig
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterConfig {
    pub name: String,

    /// Kubeconfig context, the current context when unset
    #[serde(default)]
    pub context: Option<String>,
}

/// Placement of one pool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PoolConfig {
    pub name: String,
    pub cluster: String,

    /// Explicit namespace, overriding the cluster's namespace policy
    #[serde(default)]
    pub namespace: Option<String>,
}

impl PoolConfig {
    /// Parses `CRONPILOT_POOLS`: comma separated `pool=cluster` or
    /// `pool=cluster/namespace` entries.
    pub fn list_from_env() -> Result<Vec<Self>> {
        let Ok(raw) = std::env::var("CRONPILOT_POOLS") else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }

    fn parse(entry: &str) -> Result<Self> {
        let (name, placement) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidValue(format!("CRONPILOT_POOLS entry {entry}")))?;
        let (cluster, namespace) = match placement.split_once('/') {
            Some((cluster, namespace)) => (cluster, Some(namespace.to_string())),
            None => (placement, None),
        };
        Ok(Self {
            name: name.to_string(),
            cluster: cluster.to_string(),
            namespace,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.cluster.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "pool {:?} needs a name and a cluster",
                self.name
            )));
        }
        if self.namespace.as_deref() == Some("") {
            return Err(ConfigError::InvalidValue(format!(
                "pool {} has an empty namespace",
                self.name
            )));
        }
        Ok(())
    }
}

/// Overcommit factors applied when deriving requests from plan limits
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ResourceConfig {
    pub memory_overcommit: f64,
    pub cpu_overcommit: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            memory_overcommit: 1.0,
            cpu_overcommit: 1.0,
        }
    }
}

impl ResourceConfig {
    pub fn from_env() -> Result<Self> {
        let memory_overcommit = std::env::var("CRONPILOT_MEMORY_OVERCOMMIT")
            .unwrap_or_else(|_| "1.0".to_string())
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidValue("CRONPILOT_MEMORY_OVERCOMMIT".to_string()))?;

        let cpu_overcommit = std::env::var("CRONPILOT_CPU_OVERCOMMIT")
            .unwrap_or_else(|_| "1.0".to_string())
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidValue("CRONPILOT_CPU_OVERCOMMIT".to_string()))?;

        Ok(Self {
            memory_overcommit,
            cpu_overcommit,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_overcommit.is_nan() || self.memory_overcommit < 1.0 {
            return Err(ConfigError::InvalidValue(
                "memory_overcommit must be >= 1".to_string(),
            ));
        }
        if self.cpu_overcommit.is_nan() || self.cpu_overcommit < 1.0 {
            return Err(ConfigError::InvalidValue(
                "cpu_overcommit must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AuditConfig {
    pub fn from_env() -> Result<Self> {
        let enabled = std::env::var("CRONPILOT_AUDIT_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .map_err(|_| ConfigError::InvalidValue("CRONPILOT_AUDIT_ENABLED".to_string()))?;

        Ok(Self { enabled })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,

    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        let level = std::env::var("CRONPILOT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let format = std::env::var("CRONPILOT_LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

        Ok(Self { level, format })
    }

    pub fn validate(&self) -> Result<()> {
        match LogFormat::parse(&self.format) {
            Some(_) => Ok(()),
            None => Err(ConfigError::InvalidValue(format!(
                "log format must be json or pretty, got {}",
                self.format
            ))),
        }
    }
}

/// Prometheus endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Port serving `/metrics` and `/health`
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl MetricsConfig {
    pub fn from_env() -> Result<Self> {
        let enabled = std::env::var("CRONPILOT_METRICS_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|_| ConfigError::InvalidValue("CRONPILOT_METRICS_ENABLED".to_string()))?;

        let port = std::env::var("CRONPILOT_METRICS_PORT")
            .unwrap_or_else(|_| default_metrics_port().to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("CRONPILOT_METRICS_PORT".to_string()))?;

        Ok(Self { enabled, port })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    FileRead(std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseYaml(serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
