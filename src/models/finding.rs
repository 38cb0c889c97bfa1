use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity a burst was grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Ip,
    User,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetKind::Ip => "ip",
            TargetKind::User => "user",
        };
        write!(f, "{}", s)
    }
}

/// A suspicious pattern detected in a sequence of auth events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    /// Failures for one address or user dense enough to cross the threshold
    BruteForceBurst {
        target_kind: TargetKind,
        target_value: String,
        count: usize,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    },
    /// A successful login preceded by failures from the same address
    PostFailureSuccess {
        source_address: String,
        user: String,
        success_time: NaiveDateTime,
        preceding_failure_count: usize,
    },
}

impl Finding {
    /// Rule name used in console output and logs
    pub fn rule_name(&self) -> &'static str {
        match self {
            Finding::BruteForceBurst { .. } => "Brute Force Burst",
            Finding::PostFailureSuccess { .. } => "Success After Failures",
        }
    }

    /// Human-readable one-line description, also fed to the narrative digest
    pub fn description(&self) -> String {
        match self {
            Finding::BruteForceBurst {
                target_kind,
                target_value,
                count,
                window_start,
                window_end,
            } => format!(
                "{} failed logins for {} {} between {} and {}",
                count, target_kind, target_value, window_start, window_end
            ),
            Finding::PostFailureSuccess {
                source_address,
                user,
                success_time,
                preceding_failure_count,
            } => format!(
                "Successful login for {} from {} at {} after {} recent failures",
                user, source_address, success_time, preceding_failure_count
            ),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule_name(), self.description())
    }
}
