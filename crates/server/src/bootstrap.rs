//! Server Bootstrap
//!
//! Wires configuration into the event bridge and one event watcher per
//! configured cluster, scoped to that cluster's pool namespaces.

use cronpilot_adapters::config::{AppConfig, ClusterConfig, ConfigError};
use cronpilot_adapters::{PlanResourceResolver, StaticClusterResolver, TracingAuditSink};
use cronpilot_kubernetes::{
    bridge_metrics, EventWatcher, JobEventBridge, KubeCluster, KubernetesJobProvisioner,
    ServiceAccountProvisioner,
};
use cronpilot_ports::{ClusterClient, ClusterResolver, JobProvisioner};
use kube::config::KubeConfigOptions;
use prometheus::Registry;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to cluster {name}: {message}")]
    Cluster { name: String, message: String },

    #[error("Pool {pool} references unknown cluster {cluster}")]
    UnknownCluster { pool: String, cluster: String },

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

/// What the binary runs: the event watchers and the metrics registry.
///
/// The job provisioner is not part of it; callers that manage jobs build one
/// over `resolver` with [`build_provisioner`].
pub struct ServerComponents {
    pub config: AppConfig,
    pub registry: Registry,
    pub resolver: Arc<StaticClusterResolver>,
    pub watchers: Vec<EventWatcher>,
}

pub async fn initialize_server(config: AppConfig) -> Result<ServerComponents> {
    info!("🚀 Initializing cronpilot server");

    let registry = Registry::new();
    if config.metrics.enabled {
        bridge_metrics().register(&registry)?;
        info!("✅ Metrics registered");
    }

    let mut kube_clusters = Vec::with_capacity(config.kubernetes.clusters.len());
    for cluster in &config.kubernetes.clusters {
        let connected = Arc::new(connect_cluster(cluster, &config).await.map_err(|e| {
            error!("❌ {}", e);
            e
        })?);
        info!(cluster = %cluster.name, context = ?cluster.context, "✅ Cluster client ready");
        kube_clusters.push(connected);
    }

    let clients: BTreeMap<String, Arc<dyn ClusterClient>> = kube_clusters
        .iter()
        .map(|c| (c.name().to_string(), Arc::clone(c) as Arc<dyn ClusterClient>))
        .collect();
    let resolver = Arc::new(build_resolver(&config, &clients)?);

    let sink = Arc::new(TracingAuditSink::new(config.audit.clone()));
    let bridge = Arc::new(JobEventBridge::new(sink));

    let watchers = kube_clusters
        .iter()
        .map(|cluster| {
            EventWatcher::new(
                cluster.kube_client().clone(),
                Arc::clone(cluster) as Arc<dyn ClusterClient>,
                config.pool_namespaces(cluster.name()),
                bridge.clone(),
            )
        })
        .collect();

    Ok(ServerComponents {
        config,
        registry,
        resolver,
        watchers,
    })
}

/// Job provisioner over the configured pools, sized by the configured
/// overcommit factors
pub fn build_provisioner(
    config: &AppConfig,
    resolver: Arc<dyn ClusterResolver>,
) -> Arc<dyn JobProvisioner> {
    Arc::new(KubernetesJobProvisioner::new(
        resolver,
        Arc::new(PlanResourceResolver::new(config.resources)),
        Arc::new(ServiceAccountProvisioner),
    ))
}

/// Builds a client from the named kubeconfig context, or from the inferred
/// configuration (in-cluster or current context) when none is given.
pub async fn connect_cluster(cluster: &ClusterConfig, config: &AppConfig) -> Result<KubeCluster> {
    let fail = |message: String| BootstrapError::Cluster {
        name: cluster.name.clone(),
        message,
    };
    let mut kube_config = match &cluster.context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            };
            kube::Config::from_kubeconfig(&options)
                .await
                .map_err(|e| fail(e.to_string()))?
        }
        None => kube::Config::infer().await.map_err(|e| fail(e.to_string()))?,
    };
    kube_config.accept_invalid_certs = config.kubernetes.insecure_skip_verify;

    let client = kube::Client::try_from(kube_config).map_err(|e| fail(e.to_string()))?;
    Ok(KubeCluster::new(
        &cluster.name,
        client,
        config.namespace_policy(&cluster.name),
    ))
}

/// Maps every configured pool onto its cluster client
pub fn build_resolver(
    config: &AppConfig,
    clients: &BTreeMap<String, Arc<dyn ClusterClient>>,
) -> Result<StaticClusterResolver> {
    let mut resolver = StaticClusterResolver::new();
    for pool in &config.pools {
        let client = clients
            .get(&pool.cluster)
            .ok_or_else(|| BootstrapError::UnknownCluster {
                pool: pool.name.clone(),
                cluster: pool.cluster.clone(),
            })?;
        resolver.insert(&pool.name, Arc::clone(client));
    }
    Ok(resolver)
}

pub fn log_config_summary(config: &AppConfig) {
    info!("📋 Configuration Summary:");
    for cluster in &config.kubernetes.clusters {
        let policy = config.namespace_policy(&cluster.name);
        for pool in config.pools.iter().filter(|p| p.cluster == cluster.name) {
            info!(
                cluster = %cluster.name,
                pool = %pool.name,
                namespace = %policy.namespace_for(&pool.name),
                "   pool placement"
            );
        }
    }
    info!(
        memory_overcommit = config.resources.memory_overcommit,
        cpu_overcommit = config.resources.cpu_overcommit,
        audit = config.audit.enabled,
        metrics = config.metrics.enabled,
        "   runtime settings"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronpilot_adapters::config::{K8sGlobalConfig, PoolConfig};
    use cronpilot_adapters::InMemoryCluster;
    use pretty_assertions::assert_eq;

    fn config(pools: Vec<(&str, &str, Option<&str>)>) -> AppConfig {
        AppConfig {
            kubernetes: K8sGlobalConfig {
                insecure_skip_verify: false,
                namespace_prefix: "cronpilot".to_string(),
                default_namespace: "default".to_string(),
                clusters: vec![ClusterConfig {
                    name: "main".to_string(),
                    context: None,
                }],
            },
            pools: pools
                .into_iter()
                .map(|(name, cluster, namespace)| PoolConfig {
                    name: name.to_string(),
                    cluster: cluster.to_string(),
                    namespace: namespace.map(str::to_string),
                })
                .collect(),
            resources: Default::default(),
            audit: Default::default(),
            logging: Default::default(),
            metrics: Default::default(),
        }
    }

    fn clients(config: &AppConfig) -> BTreeMap<String, Arc<dyn ClusterClient>> {
        BTreeMap::from([(
            "main".to_string(),
            Arc::new(InMemoryCluster::new("main", config.namespace_policy("main")))
                as Arc<dyn ClusterClient>,
        )])
    }

    #[tokio::test]
    async fn test_build_resolver_places_pools() {
        use cronpilot_ports::ClusterResolver;

        let config = config(vec![("p1", "main", None), ("legacy", "main", Some("jobs"))]);
        let resolver = build_resolver(&config, &clients(&config)).unwrap();

        let client = resolver.cluster_for_pool("p1").await.unwrap();
        assert_eq!(client.pool_namespace("p1"), "cronpilot-p1");
        let client = resolver.cluster_for_pool("legacy").await.unwrap();
        assert_eq!(client.pool_namespace("legacy"), "jobs");
        assert!(resolver.cluster_for_pool("unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_build_provisioner_manages_jobs_on_resolved_cluster() {
        use cronpilot_core::{ContainerInfo, Job, JobMetadata, JobSpec, Plan};

        let config = config(vec![("p1", "main", None)]);
        let cluster = Arc::new(InMemoryCluster::new("main", config.namespace_policy("main")));
        let clients = BTreeMap::from([(
            "main".to_string(),
            Arc::clone(&cluster) as Arc<dyn ClusterClient>,
        )]);
        let resolver = Arc::new(build_resolver(&config, &clients).unwrap());
        let provisioner = build_provisioner(&config, resolver);

        let job = Job {
            name: "mailer".to_string(),
            team_owner: None,
            pool: "p1".to_string(),
            plan: Plan::default(),
            metadata: JobMetadata::default(),
            spec: JobSpec {
                schedule: "@daily".to_string(),
                container: ContainerInfo {
                    original_image_src: "busybox:1.36".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        assert_eq!(provisioner.create_job(&job).await.unwrap(), "mailer");
        assert!(cluster.cron_job("cronpilot-p1", "mailer").is_some());
    }

    #[test]
    fn test_watched_namespaces_follow_pool_placement() {
        let config = config(vec![("p1", "main", None), ("legacy", "main", Some("jobs"))]);
        let namespaces: Vec<String> = config.pool_namespaces("main").into_iter().collect();
        assert_eq!(namespaces, vec!["cronpilot-p1", "jobs"]);
    }

    #[test]
    fn test_build_resolver_rejects_unknown_cluster() {
        let config = config(vec![("p1", "elsewhere", None)]);
        let result = build_resolver(&config, &clients(&config));
        assert!(matches!(
            result,
            Err(BootstrapError::UnknownCluster { .. })
        ));
    }
}
