//! Cluster event watcher
//!
//! Streams core/v1 events whose involved object is a Job, one watch per pool
//! namespace served by the cluster, resolves the execution they refer to and
//! hands both to the [`JobEventBridge`]. Events from any other namespace are
//! never recorded.

use crate::events::JobEventBridge;
use cronpilot_ports::ClusterClient;
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1 as corev1;
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const JOB_EVENT_FIELD_SELECTOR: &str = "involvedObject.kind=Job";

pub struct EventWatcher {
    kube: kube::Client,
    cluster: Arc<dyn ClusterClient>,
    namespaces: BTreeSet<String>,
    bridge: Arc<JobEventBridge>,
}

impl EventWatcher {
    pub fn new(
        kube: kube::Client,
        cluster: Arc<dyn ClusterClient>,
        namespaces: BTreeSet<String>,
        bridge: Arc<JobEventBridge>,
    ) -> Self {
        Self {
            kube,
            cluster,
            namespaces,
            bridge,
        }
    }

    /// Watches until `shutdown` fires. Stream errors are retried with the
    /// watcher's default backoff.
    pub async fn run(&self, shutdown: oneshot::Receiver<()>) {
        if self.namespaces.is_empty() {
            warn!(cluster = self.cluster.name(), "no pool namespaces to watch");
            return;
        }

        let config = watcher::Config::default().fields(JOB_EVENT_FIELD_SELECTOR);
        let watches = self.namespaces.iter().map(|namespace| {
            let api: Api<corev1::Event> = Api::namespaced(self.kube.clone(), namespace);
            watcher(api, config.clone())
                .default_backoff()
                .applied_objects()
                .boxed()
        });
        let mut events = stream::select_all(watches);
        let mut shutdown = shutdown;

        info!(
            cluster = self.cluster.name(),
            namespaces = ?self.namespaces,
            "watching job events"
        );
        loop {
            tokio::select! {
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        process_event(
                            self.cluster.as_ref(),
                            &self.namespaces,
                            &self.bridge,
                            event,
                        )
                        .await;
                    }
                    Some(Err(e)) => {
                        warn!(cluster = self.cluster.name(), error = %e, "job event stream error");
                    }
                    None => break,
                },
                _ = &mut shutdown => break,
            }
        }
        info!(cluster = self.cluster.name(), "job event watcher stopped");
    }
}

/// Looks up the execution an event refers to and schedules it on the bridge.
/// Returns `None` when the event is skipped: not about a Job, or about a Job
/// outside the pool namespaces in `managed`.
pub async fn process_event(
    cluster: &dyn ClusterClient,
    managed: &BTreeSet<String>,
    bridge: &Arc<JobEventBridge>,
    event: corev1::Event,
) -> Option<JoinHandle<()>> {
    if !is_job_event(&event) {
        return None;
    }
    let object = &event.involved_object;
    let name = object.name.clone()?;
    let namespace = object
        .namespace
        .clone()
        .or_else(|| event.metadata.namespace.clone())?;
    if !managed.contains(&namespace) {
        debug!(%namespace, execution = %name, "ignoring job event outside pool namespaces");
        return None;
    }

    let lookup = cluster.get_job(&namespace, &name).await;
    match lookup {
        Ok(execution) => Some(bridge.spawn_observe(execution, event)),
        Err(e) if e.is_not_found() => {
            debug!(%namespace, execution = %name, "execution gone before its event was handled");
            None
        }
        Err(e) => {
            warn!(%namespace, execution = %name, error = %e, "failed to load execution for event");
            None
        }
    }
}

pub fn is_job_event(event: &corev1::Event) -> bool {
    event.involved_object.kind.as_deref() == Some("Job")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_job_event() {
        let mut event = corev1::Event::default();
        assert!(!is_job_event(&event));

        event.involved_object.kind = Some("Pod".to_string());
        assert!(!is_job_event(&event));

        event.involved_object.kind = Some("Job".to_string());
        assert!(is_job_event(&event));
    }
}
