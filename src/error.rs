//! Error types re-exported from one place.
//!
//! Each module owns its error enum. Execution failures are not errors: the
//! executor reports them as an [`ExecutionOutcome`](crate::models::ExecutionOutcome).

pub use crate::config::ConfigError;
pub use crate::coordinator::CoordinatorError;
pub use crate::executor::ExecutorError;
pub use crate::formatter::FormatError;
pub use crate::history::HistoryError;
pub use crate::models::ValidationError;
