//! Audit Sink Port
//!
//! The event store accepts a descriptor to open an event and a completion
//! call carrying an optional error and a string-keyed custom data bag.
//! Delivery idempotency is the sink's concern.

use async_trait::async_trait;
use cronpilot_core::AuditEventOpts;
use std::collections::BTreeMap;
use std::fmt;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit event rejected: {0}")]
    Rejected(String),

    #[error("audit event {0} not found")]
    UnknownEvent(AuditEventId),

    #[error("audit storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuditEventId(pub String);

impl fmt::Display for AuditEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn open(&self, opts: AuditEventOpts) -> Result<AuditEventId, AuditError>;

    async fn done(
        &self,
        id: &AuditEventId,
        error: Option<String>,
        custom_data: BTreeMap<String, String>,
    ) -> Result<(), AuditError>;
}
