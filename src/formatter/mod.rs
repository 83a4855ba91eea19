//! Response processing: content detection, pretty-printing and search.
//!
//! [`process`] turns a raw response into a [`FormattedResponse`]. It is pure and
//! synchronous: the same input always yields the same output, and nothing here
//! touches the network or the disk.
//!
//! Structured formatting never fails the response. When a body cannot be
//! formatted as its declared kind, the raw text is shown as plain text and the
//! reason is kept in [`FormattedResponse::fallback`].

pub mod content_type;
pub mod html;
pub mod json;
pub mod search;
pub mod xml;

pub use content_type::ContentKind;
pub use search::SearchIndex;

use content_type::{declared_kind, sniff};
use html::{format_html_pretty, minify_html};
use json::{format_json_pretty, minify_json};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use xml::{format_xml_pretty, minify_xml};

/// Bodies larger than this are shown raw instead of being re-formatted (10MB).
pub const MAX_FORMAT_SIZE: usize = 10 * 1024 * 1024;

/// Reasons structured formatting was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("invalid HTML: {0}")]
    Html(String),

    #[error("response too large to format ({} bytes, limit {})", .0, MAX_FORMAT_SIZE)]
    TooLarge(usize),
}

/// Read-only view of a response body, ready for display and search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedResponse {
    pub content_kind: ContentKind,

    /// Display text. `None` for binary content.
    pub pretty_text: Option<String>,

    /// Token index over `pretty_text`. Not persisted; see [`FormattedResponse::reindex`].
    #[serde(skip)]
    pub search_index: SearchIndex,

    /// Exact length of the original body in bytes.
    pub size_bytes: usize,

    /// Why structured formatting was abandoned, when it was.
    pub fallback: Option<String>,
}

impl FormattedResponse {
    fn binary(size_bytes: usize) -> Self {
        Self {
            content_kind: ContentKind::Binary,
            pretty_text: None,
            search_index: SearchIndex::default(),
            size_bytes,
            fallback: None,
        }
    }

    fn textual(
        content_kind: ContentKind,
        text: String,
        size_bytes: usize,
        fallback: Option<String>,
    ) -> Self {
        Self {
            content_kind,
            search_index: SearchIndex::build(&text),
            pretty_text: Some(text),
            size_bytes,
            fallback,
        }
    }

    /// Start byte offsets in `pretty_text` of every non-overlapping occurrence of `query`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rappit_core::formatter::process;
    ///
    /// let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    /// let formatted = process(200, &headers, br#"{"a":1,"b":[2,3]}"#);
    /// assert_eq!(formatted.find("b", false), vec![15]);
    /// ```
    pub fn find(&self, query: &str, case_sensitive: bool) -> Vec<usize> {
        match &self.pretty_text {
            Some(text) => self.search_index.find(text, query, case_sensitive),
            None => Vec::new(),
        }
    }

    /// Offsets of a whole token, matched case-insensitively.
    pub fn find_token(&self, token: &str) -> &[usize] {
        self.search_index.find_token(token)
    }

    /// Rebuilds the search index, e.g. after deserialization.
    pub fn reindex(&mut self) {
        self.search_index = match &self.pretty_text {
            Some(text) => SearchIndex::build(text),
            None => SearchIndex::default(),
        };
    }

    /// Formats the size in a human-readable format.
    pub fn format_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Classifies, formats and indexes a response body.
///
/// A declared binary type, or a body that is not valid UTF-8, yields binary
/// content with no text. A leading byte order mark is tolerated and stripped.
pub fn process(status_code: u16, headers: &[(String, String)], body: &[u8]) -> FormattedResponse {
    let size_bytes = body.len();
    let declared = declared_kind(headers);

    if declared == Some(ContentKind::Binary) {
        return FormattedResponse::binary(size_bytes);
    }

    let text = match std::str::from_utf8(body) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text),
        Err(_) => {
            debug!("{} response body is not UTF-8, treating as binary", status_code);
            return FormattedResponse::binary(size_bytes);
        }
    };

    if text.len() > MAX_FORMAT_SIZE {
        let reason = FormatError::TooLarge(text.len()).to_string();
        debug!("{} response: {}", status_code, reason);
        let kind = declared.unwrap_or(ContentKind::Plain);
        return FormattedResponse::textual(kind, text.to_string(), size_bytes, Some(reason));
    }

    match declared {
        Some(kind) => match render(kind, text) {
            Ok(pretty) => FormattedResponse::textual(kind, pretty, size_bytes, None),
            Err(err) => {
                debug!(
                    "{} response declared as {} but could not be formatted: {}",
                    status_code, kind, err
                );
                // the header may simply be wrong, so give sniffing a chance
                let (kind, pretty) = match sniff(text) {
                    sniffed if sniffed != kind => render(sniffed, text)
                        .map(|pretty| (sniffed, pretty))
                        .unwrap_or_else(|_| (ContentKind::Plain, text.to_string())),
                    _ => (ContentKind::Plain, text.to_string()),
                };
                FormattedResponse::textual(kind, pretty, size_bytes, Some(err.to_string()))
            }
        },
        None => {
            let sniffed = sniff(text);
            match render(sniffed, text) {
                Ok(pretty) => FormattedResponse::textual(sniffed, pretty, size_bytes, None),
                Err(_) => {
                    FormattedResponse::textual(ContentKind::Plain, text.to_string(), size_bytes, None)
                }
            }
        }
    }
}

fn render(kind: ContentKind, text: &str) -> Result<String, FormatError> {
    match kind {
        ContentKind::Json => format_json_pretty(text),
        ContentKind::Xml => format_xml_pretty(text),
        ContentKind::Html => format_html_pretty(text),
        ContentKind::Plain | ContentKind::Binary => Ok(text.to_string()),
    }
}

/// Compacts JSON, XML or HTML text.
///
/// Other kinds, and text that does not parse as `kind`, are returned unchanged.
pub fn minify(text: &str, kind: ContentKind) -> String {
    let minified = match kind {
        ContentKind::Json => minify_json(text),
        ContentKind::Xml => minify_xml(text),
        ContentKind::Html => minify_html(text),
        ContentKind::Plain | ContentKind::Binary => return text.to_string(),
    };

    minified.unwrap_or_else(|err| {
        debug!("minify skipped: {}", err);
        text.to_string()
    })
}

/// Formats a byte count, e.g. `456 B` or `1.23 KB`.
pub fn format_size(size: usize) -> String {
    if size < 1024 {
        format!("{} B", size)
    } else if size < 1024 * 1024 {
        format!("{:.2} KB", size as f64 / 1024.0)
    } else {
        format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))
    }
}

/// Formats a duration, e.g. `120ms` or `1.500s`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
