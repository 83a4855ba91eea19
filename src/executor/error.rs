//! Executor error types and failure classification.
//!
//! Network failures are not errors at this level: they become
//! [`ExecutionOutcome::NetworkFailure`](crate::models::ExecutionOutcome) with a
//! [`FailureKind`]. The only real error is failing to build the HTTP client.

use crate::models::FailureKind;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Errors raised while setting up an executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Maps a reqwest error onto a [`FailureKind`].
///
/// reqwest only exposes coarse predicates, so the underlying cause is found by
/// walking the source chain: typed `io` and `hyper` errors first, then the cause
/// messages. The top-level message is skipped because it embeds the request
/// URL, and a host such as `tls.example.com` must not look like a TLS failure.
pub fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_redirect() {
        return FailureKind::TooManyRedirects;
    }

    if io_error_kind(err) == Some(io::ErrorKind::ConnectionRefused) {
        return FailureKind::ConnectionRefused;
    }

    if let Some(hyper_err) = hyper_error(err) {
        if hyper_err.is_parse()
            || hyper_err.is_parse_status()
            || hyper_err.is_parse_too_large()
            || hyper_err.is_incomplete_message()
        {
            return FailureKind::ProtocolError;
        }
    }

    let causes = source_messages(err).join(": ").to_lowercase();

    if causes.contains("connection refused") {
        FailureKind::ConnectionRefused
    } else if causes.contains("dns error")
        || causes.contains("failed to lookup address")
        || causes.contains("name or service not known")
        || causes.contains("no such host")
    {
        FailureKind::DnsFailure
    } else if causes.contains("certificate")
        || causes.contains("tls")
        || causes.contains("ssl")
        || causes.contains("handshake")
    {
        FailureKind::TlsError
    } else if err.is_body()
        || err.is_decode()
        || err.is_builder()
        || causes.contains("connection closed before message completed")
        || causes.contains("incomplete message")
        || causes.contains("parse")
    {
        FailureKind::ProtocolError
    } else {
        FailureKind::Unknown
    }
}

/// Full human-readable description: the error followed by each of its causes.
///
/// reqwest and hyper already print their immediate cause, so a cause whose
/// text is part of the description so far is not repeated.
pub fn describe(err: &reqwest::Error) -> String {
    append_causes(err.to_string(), source_messages(err))
}

fn append_causes(mut description: String, causes: Vec<String>) -> String {
    for cause in causes {
        if !description.contains(&cause) {
            description.push_str(": ");
            description.push_str(&cause);
        }
    }
    description
}

fn source_messages(err: &reqwest::Error) -> Vec<String> {
    let mut messages = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    messages
}

fn hyper_error(err: &reqwest::Error) -> Option<&hyper::Error> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            return Some(hyper_err);
        }
        source = cause.source();
    }
    None
}

fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = cause.source();
    }
    None
}
