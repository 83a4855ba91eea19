//! Configuration schema for the request execution core.
//!
//! This module defines the configuration structure and validation logic for all
//! user-configurable settings that affect request execution and history.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors reported when a configuration fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("timeoutMs must be greater than 0")]
    ZeroTimeout,

    #[error("historyLimit must be greater than 0")]
    ZeroHistoryLimit,

    #[error("userAgent must not be empty")]
    EmptyUserAgent,
}

/// Main configuration structure for the core.
///
/// All settings are read from the "rappit" key of the application settings.
/// Missing settings fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    /// Default request timeout in milliseconds.
    ///
    /// Covers connecting, sending, and reading the full response body.
    /// Defaults to 30000ms. Must be greater than 0.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether new requests follow redirects unless told otherwise.
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,

    /// Maximum number of chained redirects to follow. Defaults to 10.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Whether to validate TLS certificates.
    ///
    /// **Warning:** disabling this accepts self-signed and expired certificates.
    #[serde(default = "default_validate_ssl")]
    pub validate_ssl: bool,

    /// Maximum number of entries kept in history. Oldest entries are evicted first.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Location of the history file. `None` selects the per-user default.
    #[serde(default)]
    pub history_file: Option<PathBuf>,

    /// Whether credentials are masked before a request is written to history.
    #[serde(default)]
    pub redact_sensitive_headers: bool,

    /// Value of the `User-Agent` header sent when a request does not set one.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            follow_redirects: default_follow_redirects(),
            max_redirects: default_max_redirects(),
            validate_ssl: default_validate_ssl(),
            history_limit: default_history_limit(),
            history_file: None,
            redact_sensitive_headers: false,
            user_agent: default_user_agent(),
        }
    }
}

impl CoreConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.history_limit == 0 {
            return Err(ConfigError::ZeroHistoryLimit);
        }

        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyUserAgent);
        }

        // max_redirects may be 0: redirects are then reported as failures.
        Ok(())
    }

    /// Returns the timeout as a `Duration`.
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolves where the history file lives.
    ///
    /// Returns the configured path, or `~/.config/rappit/history.jsonl`
    /// (`%USERPROFILE%\AppData\Roaming\rappit\history.jsonl` on Windows).
    /// `None` when no home directory can be determined.
    pub fn history_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.history_file {
            return Some(path.clone());
        }

        let config_dir = if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config")
        } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
            PathBuf::from(user_profile).join("AppData").join("Roaming")
        } else {
            return None;
        };

        Some(config_dir.join("rappit").join("history.jsonl"))
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_follow_redirects() -> bool {
    true
}

fn default_max_redirects() -> usize {
    10
}

fn default_validate_ssl() -> bool {
    true
}

fn default_history_limit() -> usize {
    1000
}

fn default_user_agent() -> String {
    format!("rappit/{}", env!("CARGO_PKG_VERSION"))
}
