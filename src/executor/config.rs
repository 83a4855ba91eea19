//! HTTP client configuration.
//!
//! Settings here apply to the reqwest clients an [`HttpExecutor`](super::HttpExecutor)
//! holds. Per-request settings (timeout, whether to follow redirects) live on
//! the [`RequestSpec`](crate::models::RequestSpec).

use crate::config::get_config;
use serde::{Deserialize, Serialize};

/// Configuration for the shipped HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of chained redirects followed before failing.
    pub max_redirects: usize,

    /// Whether TLS certificates are validated.
    pub validate_ssl: bool,

    /// `User-Agent` sent when the request does not carry one.
    pub user_agent: String,
}

impl ExecutionConfig {
    /// Creates an ExecutionConfig from the global configuration.
    pub fn from_global_config() -> Self {
        let global_config = get_config();
        Self {
            max_redirects: global_config.max_redirects,
            validate_ssl: global_config.validate_ssl,
            user_agent: global_config.user_agent,
        }
    }
}

impl Default for ExecutionConfig {
    /// Reads the current global configuration.
    fn default() -> Self {
        Self::from_global_config()
    }
}
