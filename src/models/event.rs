use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Outcome of a single authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Failed,
    Succeeded,
}

impl EventKind {
    /// Label used in event tables ("Failed" / "Accepted")
    pub fn status_label(&self) -> &'static str {
        match self {
            EventKind::Failed => "Failed",
            EventKind::Succeeded => "Accepted",
        }
    }
}

/// One authentication attempt extracted from a log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub kind: EventKind,
    /// `None` when the syslog timestamp could not be resolved
    pub timestamp: Option<NaiveDateTime>,
    pub user: String,
    pub source_address: String,
    pub raw_line: String,
}

impl AuthEvent {
    pub fn is_failure(&self) -> bool {
        self.kind == EventKind::Failed
    }

    pub fn is_success(&self) -> bool {
        self.kind == EventKind::Succeeded
    }
}
