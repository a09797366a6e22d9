//! Job Event Bridge
//!
//! Turns Kubernetes events about Jobs into platform audit events. The
//! audit event is filed against the job's real owner: the CronJob that
//! spawned the execution when there is one, the execution itself otherwise.
//!
//! This is a best-effort path. Failures are logged and counted, never
//! returned to whoever delivered the event.

use crate::metrics::bridge_metrics;
use crate::trigger::CRON_JOB_KIND;
use cronpilot_core::{AuditEventOpts, PermissionScheme};
use cronpilot_ports::{AuditError, AuditSink};
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::api::core::v1 as corev1;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Event reasons that produce an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventReason {
    Completed,
    BackoffLimitExceeded,
    SuccessfulCreate,
}

impl JobEventReason {
    /// `None` for reasons that are not audited.
    pub fn parse(reason: &str) -> Option<Self> {
        match reason {
            "Completed" => Some(Self::Completed),
            "BackoffLimitExceeded" => Some(Self::BackoffLimitExceeded),
            "SuccessfulCreate" => Some(Self::SuccessfulCreate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::BackoffLimitExceeded => "BackoffLimitExceeded",
            Self::SuccessfulCreate => "SuccessfulCreate",
        }
    }

    pub fn audit_kind(&self) -> PermissionScheme {
        match self {
            Self::Completed | Self::BackoffLimitExceeded => PermissionScheme::JobRun,
            Self::SuccessfulCreate => PermissionScheme::JobCreate,
        }
    }

    pub fn error(&self, message: &str) -> Option<String> {
        match self {
            Self::BackoffLimitExceeded => Some(format!("job failed: {message}")),
            _ => None,
        }
    }
}

/// Name of the object that caused the execution to exist
pub fn real_job_owner(execution: &batchv1::Job) -> String {
    execution
        .metadata
        .owner_references
        .iter()
        .flatten()
        .filter(|owner| owner.kind == CRON_JOB_KIND)
        .last()
        .map(|owner| owner.name.clone())
        .unwrap_or_else(|| execution.metadata.name.clone().unwrap_or_default())
}

/// Custom data stored with the audit event
pub fn event_custom_data(
    execution: &batchv1::Job,
    owner: &str,
    event: &corev1::Event,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "job-name".to_string(),
            execution.metadata.name.clone().unwrap_or_default(),
        ),
        ("job-controller".to_string(), owner.to_string()),
        (
            "event-type".to_string(),
            event.type_.clone().unwrap_or_default(),
        ),
        (
            "event-reason".to_string(),
            event.reason.clone().unwrap_or_default(),
        ),
        (
            "message".to_string(),
            event.message.clone().unwrap_or_default(),
        ),
        (
            "cluster-start-time".to_string(),
            event
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0.to_rfc3339())
                .unwrap_or_default(),
        ),
    ])
}

pub struct JobEventBridge {
    sink: Arc<dyn AuditSink>,
}

impl JobEventBridge {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Records one lifecycle event of an execution. Never fails.
    pub async fn observe(&self, execution: &batchv1::Job, event: &corev1::Event) {
        let raw_reason = event.reason.as_deref().unwrap_or_default();
        let Some(reason) = JobEventReason::parse(raw_reason) else {
            debug!(reason = raw_reason, "ignoring job event");
            bridge_metrics().record_ignored();
            return;
        };

        let owner = real_job_owner(execution);
        if let Err(e) = self.record(reason, execution, &owner, event).await {
            bridge_metrics().record_dropped();
            warn!(
                execution = execution.metadata.name.as_deref().unwrap_or_default(),
                job = %owner,
                reason = reason.as_str(),
                error = %e,
                "dropping job event"
            );
            return;
        }
        bridge_metrics().record_event(reason.as_str());
    }

    /// Runs [`observe`](Self::observe) on a detached task.
    pub fn spawn_observe(
        self: &Arc<Self>,
        execution: batchv1::Job,
        event: corev1::Event,
    ) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move { bridge.observe(&execution, &event).await })
    }

    async fn record(
        &self,
        reason: JobEventReason,
        execution: &batchv1::Job,
        owner: &str,
        event: &corev1::Event,
    ) -> Result<(), AuditError> {
        let opts = AuditEventOpts::for_job(reason.audit_kind(), owner);
        let id = self.sink.open(opts).await?;
        let error = reason.error(event.message.as_deref().unwrap_or_default());
        self.sink
            .done(&id, error, event_custom_data(execution, owner, event))
            .await
    }
}
