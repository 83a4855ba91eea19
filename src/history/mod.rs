//! Request history tracking and persistence.
//!
//! Every completed execution is appended exactly once to a [`HistoryStore`].
//! The store is safe to share between tasks: appends are serialized by an
//! async mutex, while `list`, `search` and `get` read an immutable snapshot and
//! never wait on a writer.
//!
//! # Features
//!
//! - JSONL file with durable appends
//! - Corrupted lines skipped on load
//! - Retention cap with automatic compaction
//! - Optional redaction of credentials
//! - Case-insensitive search over URL, headers and response text
//!
//! # Example
//!
//! ```no_run
//! use rappit_core::history::{HistoryConfig, HistoryFilter, HistoryStore};
//!
//! # async fn example() -> Result<(), rappit_core::history::HistoryError> {
//! let store = HistoryStore::open("/tmp/history.jsonl", HistoryConfig::default()).await?;
//! for entry in store.list(&HistoryFilter::new().limit(10)) {
//!     println!("{}", entry.summary());
//! }
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod search;
pub mod storage;

pub use models::{HistoryEntry, HistoryError, PendingEntry, SENSITIVE_HEADERS};
pub use search::{matches_query, HistoryFilter};
pub use storage::{HistoryConfig, HistoryStore};
