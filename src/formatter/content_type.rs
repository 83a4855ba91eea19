//! Content type detection and classification.
//!
//! The `Content-Type` header is trusted when it names a specific format. When it
//! is absent, generic (`text/plain`, `application/octet-stream`, `*/*`) or
//! unparsable, the body is sniffed instead.

use crate::models::header_value;
use serde::{Deserialize, Serialize};

/// Content kind of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// JSON data (application/json, text/json, */*+json)
    Json,
    /// XML data (application/xml, text/xml, */*+xml)
    Xml,
    /// HTML content (text/html, application/xhtml+xml)
    Html,
    /// Any other text
    Plain,
    /// Images, audio, video, documents, archives and undecodable bodies
    Binary,
}

impl ContentKind {
    /// Returns a human-readable string representation of the content kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Json => "JSON",
            ContentKind::Xml => "XML",
            ContentKind::Html => "HTML",
            ContentKind::Plain => "Plain Text",
            ContentKind::Binary => "Binary",
        }
    }

    /// Checks if the content kind is textual (can be displayed as text).
    pub fn is_textual(&self) -> bool {
        !matches!(self, ContentKind::Binary)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/x-tar",
    "application/x-bzip2",
    "application/x-xz",
    "application/x-7z-compressed",
    "application/x-rar-compressed",
    "application/vnd.rar",
    "application/java-archive",
];

/// Content kind named by the `Content-Type` header.
///
/// Returns `None` when the header is missing, generic, unparsable or names a
/// type with no specific mapping; the caller should sniff the body then.
///
/// # Examples
///
/// ```
/// use rappit_core::formatter::content_type::{declared_kind, ContentKind};
///
/// let headers = vec![(
///     "Content-Type".to_string(),
///     "application/problem+json; charset=utf-8".to_string(),
/// )];
/// assert_eq!(declared_kind(&headers), Some(ContentKind::Json));
/// ```
pub fn declared_kind(headers: &[(String, String)]) -> Option<ContentKind> {
    let mime = essence(header_value(headers, "content-type")?)?;

    let kind = match mime.as_str() {
        "application/json" | "text/json" => ContentKind::Json,
        "application/xhtml+xml" | "text/html" => ContentKind::Html,
        "application/xml" | "text/xml" => ContentKind::Xml,
        "text/plain" | "application/octet-stream" | "*/*" => return None,
        "application/pdf" => ContentKind::Binary,
        m if m.ends_with("+json") => ContentKind::Json,
        m if m.ends_with("+xml") => ContentKind::Xml,
        m if m.starts_with("text/") => ContentKind::Plain,
        m if m.starts_with("image/") || m.starts_with("audio/") || m.starts_with("video/") => {
            ContentKind::Binary
        }
        m if ARCHIVE_TYPES.contains(&m) => ContentKind::Binary,
        _ => return None,
    };

    Some(kind)
}

/// Lower-cased `type/subtype` with parameters removed, or `None` if malformed.
fn essence(value: &str) -> Option<String> {
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = mime.split_once('/')?;

    let is_token = |s: &str| {
        !s.is_empty()
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
    };

    if is_token(kind) && is_token(subtype) {
        Some(mime)
    } else {
        None
    }
}

/// Guesses the content kind of a decoded body.
///
/// Only looks at how the text starts; the caller confirms the guess by parsing
/// and falls back to plain text when that fails.
pub fn sniff(text: &str) -> ContentKind {
    let trimmed = text.trim_start();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return ContentKind::Json;
    }

    let starts_with_ci = |prefix: &str| {
        trimmed
            .get(..prefix.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
    };

    if starts_with_ci("<!doctype html") || starts_with_ci("<html") {
        ContentKind::Html
    } else if trimmed.starts_with('<') {
        ContentKind::Xml
    } else {
        ContentKind::Plain
    }
}
