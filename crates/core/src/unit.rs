//! Unit read model
//!
//! A unit is the platform-facing view of one orchestrator execution. It is
//! recomputed on every query and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Started,
    Succeeded,
    Error,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Started => "started",
            UnitStatus::Succeeded => "succeeded",
            UnitStatus::Error => "error",
        }
    }

    /// Aggregate status from execution counters; failure dominates success.
    pub fn from_counts(failed: i32, succeeded: i32) -> Self {
        if failed > 0 {
            UnitStatus::Error
        } else if succeeded > 0 {
            UnitStatus::Succeeded
        } else {
            UnitStatus::Started
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub status: UnitStatus,
    /// Sum of container restarts across every pod of the execution.
    pub restarts: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_precedence() {
        assert_eq!(UnitStatus::from_counts(1, 1), UnitStatus::Error);
        assert_eq!(UnitStatus::from_counts(0, 1), UnitStatus::Succeeded);
        assert_eq!(UnitStatus::from_counts(0, 0), UnitStatus::Started);
        assert_eq!(UnitStatus::from_counts(3, 0), UnitStatus::Error);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&UnitStatus::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
        assert_eq!(UnitStatus::Error.to_string(), "error");
    }
}
