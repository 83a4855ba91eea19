//! Configuration management for the request execution core.
//!
//! Configuration is loaded from the application settings under the "rappit" key,
//! merged with defaults, validated, and published through a process-wide singleton.

pub mod schema;

pub use schema::{ConfigError, CoreConfig};

use log::warn;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::RwLock;

/// Settings key holding the core configuration.
pub const SETTINGS_KEY: &str = "rappit";

/// Global configuration instance.
///
/// Lazily initialized with defaults on first access and replaced when settings change.
static CONFIG: Lazy<RwLock<CoreConfig>> = Lazy::new(|| RwLock::new(CoreConfig::default()));

/// Loads configuration from a settings JSON value.
///
/// Reads the "rappit" object, fills missing keys with defaults, validates the
/// result, and updates the global configuration. Settings that fail to
/// deserialize are logged and replaced by defaults.
///
/// # Example
///
/// ```no_run
/// use rappit_core::config::load_config;
/// use serde_json::json;
///
/// let settings = json!({
///     "rappit": {
///         "timeoutMs": 60000,
///         "validateSsl": false
///     }
/// });
///
/// let config = load_config(Some(settings)).unwrap();
/// assert_eq!(config.timeout_ms, 60000);
/// ```
pub fn load_config(settings_json: Option<Value>) -> Result<CoreConfig, ConfigError> {
    let mut config = CoreConfig::default();

    if let Some(section) = settings_json.as_ref().and_then(|s| s.get(SETTINGS_KEY)) {
        match serde_json::from_value::<CoreConfig>(section.clone()) {
            Ok(user_config) => config = user_config,
            Err(e) => warn!("failed to parse {} settings, using defaults: {}", SETTINGS_KEY, e),
        }
    }

    config.validate()?;

    if let Ok(mut global_config) = CONFIG.write() {
        *global_config = config.clone();
    }

    Ok(config)
}

/// Returns a copy of the current global configuration.
pub fn get_config() -> CoreConfig {
    CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_else(|_| CoreConfig::default())
}

/// Applies an in-place change to the global configuration.
///
/// A change that leaves the configuration invalid is rejected and the previous
/// configuration is kept.
pub fn update_config<F>(updater: F) -> Result<(), ConfigError>
where
    F: FnOnce(&mut CoreConfig),
{
    let mut guard = match CONFIG.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let mut candidate = guard.clone();
    updater(&mut candidate);
    candidate.validate()?;
    *guard = candidate;
    Ok(())
}

/// Resets the global configuration to defaults.
pub fn reset_config() {
    if let Ok(mut config) = CONFIG.write() {
        *config = CoreConfig::default();
    }
}
