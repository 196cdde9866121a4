//! Configuration loading.
//!
//! The core configuration surface is just the runtime [`Settings`] flags,
//! settable by any caller at any time; nothing here sits on the I/O path.
//! This module adds the conventional file/environment layer on top:
//! a TOML file merged with `VISA_BUNDLE_`-prefixed environment variables
//! (`__` separates nesting, e.g. `VISA_BUNDLE_SETTINGS__SEND_ENABLED=true`),
//! validated after extraction.
//!
//! ```toml
//! [settings]
//! send_enabled = true
//! print_enabled = false
//!
//! [retry]
//! max_attempts = 2
//! backoff_ms = 1000
//! settle_ms = 500
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;
use crate::settings::Settings;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File/environment extraction failed.
    #[error("configuration load error: {0}")]
    Load(#[from] figment::Error),
    /// The extracted values are semantically invalid.
    #[error("configuration validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Runtime flag values to seed [`Settings`] with.
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Open retry policy overrides.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Initial values for the runtime flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Whether physical instrument I/O is performed.
    #[serde(default)]
    pub send_enabled: bool,
    /// Whether each operation emits a trace line.
    #[serde(default)]
    pub print_enabled: bool,
    /// Whether trace lines include command/response bodies.
    #[serde(default = "default_print_payloads")]
    pub print_payloads: bool,
    /// Auxiliary debug flag for collaborating layers.
    #[serde(default)]
    pub debug_enabled: bool,
    /// Auxiliary server-mode flag for collaborating layers.
    #[serde(default)]
    pub server_mode: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            send_enabled: false,
            print_enabled: false,
            print_payloads: default_print_payloads(),
            debug_enabled: false,
            server_mode: false,
        }
    }
}

impl SettingsConfig {
    /// Write these values into live settings.
    pub fn apply(&self, settings: &Settings) {
        settings.set_send_enabled(self.send_enabled);
        settings.set_print_enabled(self.print_enabled);
        settings.set_print_payloads(self.print_payloads);
        settings.set_debug_enabled(self.debug_enabled);
        settings.set_server_mode(self.server_mode);
    }
}

/// Open retry policy as configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total open attempts before failing fatally.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Sleep after a failed attempt, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Settling sleep after a successful open, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl RetryConfig {
    /// The equivalent [`RetryPolicy`].
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            settle: Duration::from_millis(self.settle_ms),
        }
    }
}

fn default_print_payloads() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_settle_ms() -> u64 {
    500
}

impl BundleConfig {
    /// Load from `visa-bundle.toml` in the working directory plus
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when extraction or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("visa-bundle.toml")
    }

    /// Load from a specific TOML file plus environment overrides. A missing
    /// file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when extraction or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VISA_BUNDLE_").split("__"))
            .extract()
            .map_err(ConfigError::Load)?;

        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints that pass extraction.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] with a descriptive message.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
