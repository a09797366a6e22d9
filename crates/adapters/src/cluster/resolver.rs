//! Static pool to cluster mapping

use async_trait::async_trait;
use cronpilot_ports::{ClusterClient, ClusterError, ClusterResolver};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolves pools against a fixed table built at startup
#[derive(Default, Clone)]
pub struct StaticClusterResolver {
    pools: BTreeMap<String, Arc<dyn ClusterClient>>,
}

impl StaticClusterResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: impl Into<String>, client: Arc<dyn ClusterClient>) -> Self {
        self.pools.insert(pool.into(), client);
        self
    }

    pub fn insert(&mut self, pool: impl Into<String>, client: Arc<dyn ClusterClient>) {
        self.pools.insert(pool.into(), client);
    }

    pub fn pools(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }
}

#[async_trait]
impl ClusterResolver for StaticClusterResolver {
    async fn cluster_for_pool(&self, pool: &str) -> Result<Arc<dyn ClusterClient>, ClusterError> {
        self.pools
            .get(pool)
            .cloned()
            .ok_or_else(|| ClusterError::PoolNotFound(pool.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use cronpilot_ports::NamespacePolicy;

    #[tokio::test]
    async fn test_resolves_configured_pools_only() {
        let cluster = Arc::new(InMemoryCluster::new(
            "main",
            NamespacePolicy::new("default"),
        ));
        let resolver = StaticClusterResolver::new().with_pool("p1", cluster);

        let client = resolver.cluster_for_pool("p1").await.unwrap();
        assert_eq!(client.name(), "main");

        let err = resolver.cluster_for_pool("p2").await.err().unwrap();
        assert_eq!(err, ClusterError::PoolNotFound("p2".to_string()));
        assert_eq!(resolver.pools().collect::<Vec<_>>(), vec!["p1"]);
    }
}
