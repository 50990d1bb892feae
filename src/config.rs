//! Configuration management for Retrace
//!
//! This module handles loading, parsing, and validating the small set of
//! tunable knobs the library exposes: session TTL, reload debounce, the
//! verification badge window, and diff presentation options.

use crate::error::{Result, RetraceError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Retrace
///
/// All fields have defaults, so an empty config file (or no file at all)
/// yields a fully working configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Checkpoint timeline configuration
    #[serde(default)]
    pub timeline: TimelineConfig,
}

/// Session registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Time-to-live for cached sessions, in hours
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,

    /// Optional override for the session store file location
    ///
    /// When unset, the store lives in the platform data directory. The
    /// `RETRACE_SESSION_STORE` environment variable takes precedence over
    /// both, which is useful for tests and alternate profiles.
    #[serde(default)]
    pub store_path: Option<String>,
}

fn default_session_ttl_hours() -> u64 {
    24
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            store_path: None,
        }
    }
}

/// Checkpoint timeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Debounce window for message-index-triggered reloads, in milliseconds
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,

    /// How long a successful verification stays marked on a checkpoint,
    /// in milliseconds
    #[serde(default = "default_verify_badge_ms")]
    pub verify_badge_ms: u64,

    /// Context lines requested for pairwise detailed diffs
    #[serde(default = "default_diff_context_lines")]
    pub diff_context_lines: usize,

    /// Whether pairwise detailed diffs ignore whitespace-only changes
    #[serde(default)]
    pub diff_ignore_whitespace: bool,
}

fn default_reload_debounce_ms() -> u64 {
    500
}

fn default_verify_badge_ms() -> u64 {
    3_000
}

fn default_diff_context_lines() -> usize {
    3
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            reload_debounce_ms: default_reload_debounce_ms(),
            verify_badge_ms: default_verify_badge_ms(),
            diff_context_lines: default_diff_context_lines(),
            diff_ignore_whitespace: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::Config` if the file cannot be read and
    /// `RetraceError::Yaml` if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RetraceError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let config: Config = serde_yaml::from_str(&contents).map_err(RetraceError::Yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::Config` if any knob is outside its usable range.
    pub fn validate(&self) -> Result<()> {
        if self.registry.session_ttl_hours == 0 {
            return Err(
                RetraceError::Config("registry.session_ttl_hours must be non-zero".to_string())
                    .into(),
            );
        }
        if self.timeline.reload_debounce_ms == 0 {
            return Err(RetraceError::Config(
                "timeline.reload_debounce_ms must be non-zero".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
