//! Configuration System
//!
//! Layered configuration for progress scopes and logging. Defaults are merged
//! with the global config file, the workspace config files and `PROSCOPE__*`
//! environment overrides, then validated.

use crate::error::ProgressError;
use crate::logging::LoggingConfig;
use crate::progress::aggregate::AggregationStrategy;
use crate::progress::registry::{HandlerRegistry, HandlerSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProscopeConfig {
    /// Progress scope defaults
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults applied to every scope built from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Disable to turn every scope into a silent one
    #[serde(default = "default_true")]
    pub enable: bool,

    /// How events from several signalers combine
    #[serde(default)]
    pub strategy: AggregationStrategy,

    /// Bounded buffer between signalers and the dispatcher
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How long scope exit waits for queued events to drain (milliseconds)
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Consecutive render failures before a handler is disabled (0 = never)
    #[serde(default = "default_max_handler_failures")]
    pub max_handler_failures: u32,

    /// Handlers for scopes built from this config; empty means the process default
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handlers: Vec<HandlerSpec>,
}

fn default_true() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_max_handler_failures() -> u32 {
    3
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable: true,
            strategy: AggregationStrategy::default(),
            channel_capacity: default_channel_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
            max_handler_failures: default_max_handler_failures(),
            handlers: Vec::new(),
        }
    }
}

impl ProgressConfig {
    /// Registry for the configured handlers, if any are configured.
    pub fn registry(&self) -> Option<HandlerRegistry> {
        if self.handlers.is_empty() {
            None
        } else {
            Some(HandlerRegistry::from_specs(self.handlers.clone()))
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.channel_capacity == 0 {
            errors.push("progress.channel_capacity must be at least 1".to_string());
        }
        if self.drain_timeout_ms == 0 {
            errors.push("progress.drain_timeout_ms must be positive".to_string());
        }
        for spec in &self.handlers {
            if let Err(e) = spec.validate() {
                errors.push(format!("handler '{}': {}", spec.name(), e));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl ProscopeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ProgressError> {
        let mut errors = match self.progress.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProgressError::Config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }
}

/// Loads [`ProscopeConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{PROSCOPE_ENV}.toml`,
    /// `PROSCOPE__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<ProscopeConfig, ProgressError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let config: ProscopeConfig = builder
            .add_source(merge::environment_source())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<ProscopeConfig, ProgressError> {
        if !path.exists() {
            return Err(ProgressError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config: ProscopeConfig = merge::builder_with_defaults()?
            .add_source(config::File::from(path.to_path_buf()))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Location of the global config file, if one can be derived.
    pub fn global_config_path() -> Option<PathBuf> {
        global_config_path()
    }
}
