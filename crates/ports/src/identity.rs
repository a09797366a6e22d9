//! Identity provisioning port

use crate::cluster::{ClusterClient, ClusterError};
use async_trait::async_trait;
use cronpilot_core::JobMetadata;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("unable to provision service account {name}: {source}")]
    Provision {
        name: String,
        #[source]
        source: ClusterError,
    },
}

/// Makes sure the identity an execution runs as exists before the job
/// template referencing it is submitted
#[async_trait]
pub trait IdentityProvisioner: Send + Sync {
    async fn ensure(
        &self,
        client: &dyn ClusterClient,
        name: &str,
        labels: &BTreeMap<String, String>,
        namespace: &str,
        metadata: &JobMetadata,
    ) -> Result<(), IdentityError>;
}
