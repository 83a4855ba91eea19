//! Search and filtering for request history.
//!
//! Both operate on snapshot entries and never touch the store itself.

use super::models::HistoryEntry;
use crate::models::{HttpMethod, OutcomeKind};

/// Criteria for [`HistoryStore::list`](super::HistoryStore::list).
///
/// Every criterion that is set must match. The default filter matches all entries.
///
/// # Example
///
/// ```
/// use rappit_core::history::HistoryFilter;
/// use rappit_core::models::{HttpMethod, OutcomeKind};
///
/// let filter = HistoryFilter::new()
///     .method(HttpMethod::POST)
///     .outcome(OutcomeKind::Success)
///     .limit(20);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub method: Option<HttpMethod>,
    pub status_code: Option<u16>,
    pub outcome: Option<OutcomeKind>,
    /// Maximum number of entries returned, newest first.
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn outcome(mut self, outcome: OutcomeKind) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Checks the entry against every criterion except `limit`.
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        self.method.map_or(true, |m| entry.request.method() == m)
            && self
                .status_code
                .map_or(true, |s| entry.outcome.status_code() == Some(s))
            && self.outcome.map_or(true, |k| entry.outcome.kind() == k)
    }
}

/// Checks if a history entry matches the given search query.
///
/// Looks at the request URL, request and response header values, and the
/// formatted response text. `query_lower` must already be lower-cased.
pub fn matches_query(entry: &HistoryEntry, query_lower: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(query_lower);

    if contains(entry.request.resolved_url().as_str()) {
        return true;
    }

    if entry
        .request
        .headers()
        .iter()
        .chain(entry.outcome.headers())
        .any(|(_, value)| contains(value))
    {
        return true;
    }

    entry
        .formatted
        .as_ref()
        .and_then(|f| f.pretty_text.as_deref())
        .is_some_and(contains)
}
