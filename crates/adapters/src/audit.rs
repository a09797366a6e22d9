//! Audit sinks
//!
//! `TracingAuditSink` writes audit events to the `audit` log target.
//! `InMemoryAuditSink` keeps them in memory so tests can inspect what was
//! recorded.

use crate::config::AuditConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cronpilot_core::AuditEventOpts;
use cronpilot_ports::{AuditError, AuditEventId, AuditSink};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

fn new_event_id() -> AuditEventId {
    AuditEventId(Uuid::new_v4().to_string())
}

pub struct TracingAuditSink {
    config: AuditConfig,
    open: Mutex<BTreeMap<AuditEventId, AuditEventOpts>>,
}

impl TracingAuditSink {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            open: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn open(&self, opts: AuditEventOpts) -> Result<AuditEventId, AuditError> {
        let id = new_event_id();
        if self.config.enabled {
            self.open.lock().insert(id.clone(), opts);
        }
        Ok(id)
    }

    async fn done(
        &self,
        id: &AuditEventId,
        error: Option<String>,
        custom_data: BTreeMap<String, String>,
    ) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }
        let opts = self
            .open
            .lock()
            .remove(id)
            .ok_or_else(|| AuditError::UnknownEvent(id.clone()))?;

        info!(
            target: "audit",
            event_id = %id,
            kind = %opts.kind,
            target_value = %opts.target.value,
            allowed = %opts.allowed.scheme,
            error = error.as_deref().unwrap_or_default(),
            custom_data = ?custom_data,
            "AUDIT EVENT"
        );
        Ok(())
    }
}

/// One event as seen by [`InMemoryAuditSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub id: AuditEventId,
    pub opts: AuditEventOpts,
    pub opened_at: DateTime<Utc>,
    /// `None` while the event is still open.
    pub outcome: Option<EventOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub error: Option<String>,
    pub custom_data: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<RecordedEvent>>,
    failure: Mutex<Option<AuditError>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later `open` fails with `error` until cleared.
    pub fn fail_with(&self, error: AuditError) {
        *self.failure.lock() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Completed events only
    pub fn completed(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.outcome.is_some())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn open(&self, opts: AuditEventOpts) -> Result<AuditEventId, AuditError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let id = new_event_id();
        self.events.lock().push(RecordedEvent {
            id: id.clone(),
            opts,
            opened_at: Utc::now(),
            outcome: None,
        });
        Ok(id)
    }

    async fn done(
        &self,
        id: &AuditEventId,
        error: Option<String>,
        custom_data: BTreeMap<String, String>,
    ) -> Result<(), AuditError> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| AuditError::UnknownEvent(id.clone()))?;
        if event.outcome.is_some() {
            return Err(AuditError::Rejected(format!("event {id} already done")));
        }
        event.outcome = Some(EventOutcome { error, custom_data });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronpilot_core::PermissionScheme;
    use tracing_test::traced_test;

    fn opts() -> AuditEventOpts {
        AuditEventOpts::for_job(PermissionScheme::JobRun, "mailer")
    }

    #[tokio::test]
    #[traced_test]
    async fn test_tracing_sink_logs_completed_event() {
        let sink = TracingAuditSink::new(AuditConfig { enabled: true });
        let id = sink.open(opts()).await.unwrap();
        sink.done(&id, Some("job failed: boom".to_string()), BTreeMap::new())
            .await
            .unwrap();

        assert!(logs_contain("AUDIT EVENT"));
        assert!(logs_contain("job failed: boom"));
    }

    #[tokio::test]
    async fn test_tracing_sink_rejects_unknown_event() {
        let sink = TracingAuditSink::new(AuditConfig { enabled: true });
        let unknown = AuditEventId("missing".to_string());
        let result = sink.done(&unknown, None, BTreeMap::new()).await;
        assert_eq!(result, Err(AuditError::UnknownEvent(unknown)));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_tracing_sink_disabled() {
        let sink = TracingAuditSink::new(AuditConfig { enabled: false });
        let id = sink.open(opts()).await.unwrap();
        sink.done(&id, None, BTreeMap::new()).await.unwrap();

        assert!(!logs_contain("AUDIT EVENT"));
    }

    #[tokio::test]
    async fn test_in_memory_sink_records_outcome() {
        let sink = InMemoryAuditSink::new();
        let id = sink.open(opts()).await.unwrap();
        assert!(sink.completed().is_empty());

        let data = BTreeMap::from([("job-name".to_string(), "mailer-1".to_string())]);
        sink.done(&id, None, data.clone()).await.unwrap();

        let events = sink.completed();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].opts, opts());
        assert_eq!(
            events[0].outcome,
            Some(EventOutcome {
                error: None,
                custom_data: data,
            })
        );
        assert!(sink.done(&id, None, BTreeMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_sink_failure_injection() {
        let sink = InMemoryAuditSink::new();
        sink.fail_with(AuditError::Storage("down".to_string()));
        assert!(sink.open(opts()).await.is_err());

        sink.clear_failure();
        assert!(sink.open(opts()).await.is_ok());
        assert_eq!(sink.events().len(), 1);
    }
}
