//! Service account provisioning for job executions

use async_trait::async_trait;
use cronpilot_core::JobMetadata;
use cronpilot_ports::{ClusterClient, ClusterError, IdentityError, IdentityProvisioner};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::debug;

/// Creates the service account when missing and keeps its labels and
/// annotations in line with the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccountProvisioner;

#[async_trait]
impl IdentityProvisioner for ServiceAccountProvisioner {
    async fn ensure(
        &self,
        client: &dyn ClusterClient,
        name: &str,
        labels: &BTreeMap<String, String>,
        namespace: &str,
        metadata: &JobMetadata,
    ) -> Result<(), IdentityError> {
        let annotations: BTreeMap<String, String> = metadata
            .annotations
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect();
        let wrap = |source: ClusterError| IdentityError::Provision {
            name: name.to_string(),
            source,
        };

        let mut existing = match client.get_service_account(namespace, name).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                let account = ServiceAccount {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(namespace.to_string()),
                        labels: Some(labels.clone()),
                        annotations: Some(annotations),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                client
                    .create_service_account(namespace, &account)
                    .await
                    .map_err(wrap)?;
                debug!(%namespace, service_account = name, "service account created");
                return Ok(());
            }
            Err(e) => return Err(wrap(e)),
        };

        let current_labels = existing.metadata.labels.clone().unwrap_or_default();
        let current_annotations = existing.metadata.annotations.clone().unwrap_or_default();
        if &current_labels == labels && current_annotations == annotations {
            return Ok(());
        }

        existing.metadata.labels = Some(labels.clone());
        existing.metadata.annotations = Some(annotations);
        client
            .update_service_account(namespace, &existing)
            .await
            .map_err(wrap)?;
        debug!(%namespace, service_account = name, "service account updated");
        Ok(())
    }
}
