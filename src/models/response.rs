//! Execution outcome data models.
//!
//! Every execution attempt ends in exactly one [`ExecutionOutcome`]. Failures
//! of the network exchange are outcome variants rather than errors, so the
//! coordinator and the history store treat every attempt the same way.

use super::base64_bytes;
use crate::formatter::{format_duration, format_size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of a failed network exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Host name could not be resolved
    DnsFailure,
    /// Nothing accepted the connection on the target port
    ConnectionRefused,
    /// Malformed or truncated HTTP exchange
    ProtocolError,
    /// Certificate or handshake failure
    TlsError,
    /// Redirect chain exceeded the configured cap
    TooManyRedirects,
    /// Anything that could not be classified
    Unknown,
}

impl FailureKind {
    /// Whether a fresh attempt might succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::DnsFailure | FailureKind::ConnectionRefused)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::DnsFailure => "DNS failure",
            FailureKind::ConnectionRefused => "connection refused",
            FailureKind::ProtocolError => "protocol error",
            FailureKind::TlsError => "TLS error",
            FailureKind::TooManyRedirects => "too many redirects",
            FailureKind::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

/// Discriminant of [`ExecutionOutcome`], used for filtering and slot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    NetworkFailure,
    Timeout,
    Cancelled,
}

/// Terminal result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// A complete HTTP response was received, whatever its status code.
    Success {
        status_code: u16,
        /// Canonical reason phrase for the status code, empty when unknown.
        reason: String,
        /// URL of the last request in the redirect chain.
        final_url: String,
        headers: Vec<(String, String)>,
        #[serde(with = "base64_bytes")]
        body: Vec<u8>,
        elapsed: Duration,
    },

    /// The exchange failed before a complete response was read.
    NetworkFailure {
        kind: FailureKind,
        message: String,
        elapsed: Duration,
    },

    /// The timeout elapsed before the response body was fully read.
    Timeout { elapsed: Duration },

    /// The attempt was cancelled before it completed.
    Cancelled { elapsed: Duration },
}

impl ExecutionOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ExecutionOutcome::Success { .. } => OutcomeKind::Success,
            ExecutionOutcome::NetworkFailure { .. } => OutcomeKind::NetworkFailure,
            ExecutionOutcome::Timeout { .. } => OutcomeKind::Timeout,
            ExecutionOutcome::Cancelled { .. } => OutcomeKind::Cancelled,
        }
    }

    /// Wall-clock time the attempt took.
    pub fn elapsed(&self) -> Duration {
        match self {
            ExecutionOutcome::Success { elapsed, .. }
            | ExecutionOutcome::NetworkFailure { elapsed, .. }
            | ExecutionOutcome::Timeout { elapsed }
            | ExecutionOutcome::Cancelled { elapsed } => *elapsed,
        }
    }

    /// True for [`ExecutionOutcome::Success`], regardless of the status code.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    /// Status code of a successful exchange.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ExecutionOutcome::Success { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Response headers, empty for every variant other than `Success`.
    pub fn headers(&self) -> &[(String, String)] {
        match self {
            ExecutionOutcome::Success { headers, .. } => headers,
            _ => &[],
        }
    }

    /// Response body, empty for every variant other than `Success`.
    pub fn body(&self) -> &[u8] {
        match self {
            ExecutionOutcome::Success { body, .. } => body,
            _ => &[],
        }
    }

    /// One-line description for logs and history listings.
    ///
    /// e.g. `200 OK (512 B, 120ms)` or `timeout after 1.002s`.
    pub fn summary(&self) -> String {
        match self {
            ExecutionOutcome::Success {
                status_code,
                reason,
                body,
                elapsed,
                ..
            } => {
                let status = if reason.is_empty() {
                    status_code.to_string()
                } else {
                    format!("{} {}", status_code, reason)
                };
                format!(
                    "{} ({}, {})",
                    status,
                    format_size(body.len()),
                    format_duration(*elapsed)
                )
            }
            ExecutionOutcome::NetworkFailure {
                kind,
                message,
                elapsed,
            } => format!("{}: {} after {}", kind, message, format_duration(*elapsed)),
            ExecutionOutcome::Timeout { elapsed } => {
                format!("timeout after {}", format_duration(*elapsed))
            }
            ExecutionOutcome::Cancelled { elapsed } => {
                format!("cancelled after {}", format_duration(*elapsed))
            }
        }
    }
}
