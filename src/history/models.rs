//! Data models for request history.
//!
//! An entry is created once per completed execution and never changes after
//! that. Its id and timestamp are assigned by the store at append time.

use crate::formatter::FormattedResponse;
use crate::models::{ExecutionOutcome, RequestSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header names whose values are masked when redaction is enabled.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
    "apikey",
    "auth-token",
    "x-auth-token",
    "access-token",
    "x-access-token",
];

/// A single entry in the request history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Strictly increasing in creation order.
    pub id: u64,

    /// When the entry was appended, in UTC.
    pub timestamp: DateTime<Utc>,

    /// Copy of the request as it was sent, possibly with credentials redacted.
    pub request: RequestSpec,

    pub outcome: ExecutionOutcome,

    /// Present only when the outcome is a success.
    pub formatted: Option<FormattedResponse>,
}

impl HistoryEntry {
    /// One-line description, e.g. `#12 GET https://example.com/ -> 200 OK (5 B, 12ms)`.
    pub fn summary(&self) -> String {
        format!("#{} {} -> {}", self.id, self.request, self.outcome.summary())
    }
}

/// An execution result waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub request: RequestSpec,
    pub outcome: ExecutionOutcome,
    pub formatted: Option<FormattedResponse>,
}

impl PendingEntry {
    /// Creates a pending entry. `formatted` is dropped unless the outcome is a success.
    pub fn new(
        request: RequestSpec,
        outcome: ExecutionOutcome,
        formatted: Option<FormattedResponse>,
    ) -> Self {
        let formatted = if outcome.is_success() { formatted } else { None };
        Self {
            request,
            outcome,
            formatted,
        }
    }

    pub(crate) fn into_entry(self, id: u64, timestamp: DateTime<Utc>, redact: bool) -> HistoryEntry {
        let request = if redact {
            self.request.redacted(SENSITIVE_HEADERS)
        } else {
            self.request
        };

        HistoryEntry {
            id,
            timestamp,
            request,
            outcome: self.outcome,
            formatted: self.formatted,
        }
    }
}

/// Errors that can occur during history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The entry could not be made durable.
    #[error("history storage error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no history file location could be determined")]
    NoHistoryPath,
}
