//! Core of an interactive API-testing client.
//!
//! Takes a fully specified HTTP request, executes it with a timeout and
//! cancellation, formats the response for display and search, and records
//! every execution in a durable history.
//!
//! # Architecture
//!
//! - **models**: Request specification and execution outcomes
//! - **auth**: Authentication schemes and header injection
//! - **config**: Global configuration read from a settings JSON value under the `rappit` key
//! - **executor**: Runs a single request over HTTP using reqwest
//! - **formatter**: Content detection, pretty printing and in-text search
//! - **history**: Append-only JSONL history with search
//! - **coordinator**: Per-slot execution lifecycle, retries and recording
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rappit_core::{Coordinator, HistoryStore, HttpExecutor, HttpMethod, RequestSpec};
//! use rappit_core::auth::AuthScheme;
//! use rappit_core::models::RequestBody;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(HttpExecutor::from_global_config()?);
//! let history = Arc::new(HistoryStore::open_default().await?);
//! let coordinator = Coordinator::new(executor, history);
//!
//! let spec = RequestSpec::builder(HttpMethod::POST, "https://api.example.com/users")
//!     .header("Accept", "application/json")
//!     .auth(AuthScheme::Bearer { token: "secret".into() })
//!     .body(RequestBody::json(r#"{"name": "Ada"}"#))
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let completion = coordinator.open_slot().send(spec).await?;
//! if let Some(text) = completion.formatted.and_then(|f| f.pretty_text) {
//!     println!("{}", text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod history;
pub mod models;

pub use coordinator::{Completion, Coordinator, Execution, RetryPolicy, Slot, SlotState};
pub use executor::{HttpExecutor, Transport};
pub use formatter::{process, ContentKind, FormattedResponse};
pub use history::{HistoryEntry, HistoryFilter, HistoryStore};
pub use models::{ExecutionOutcome, FailureKind, HttpMethod, OutcomeKind, RequestSpec};
