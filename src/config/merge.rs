//! Merge rules: defaults, override order, conflict handling.
//!
//! Sources are layered lowest to highest: defaults, global file, workspace
//! base file, workspace environment file, `PROSCOPE__*` environment variables.
//! Later sources replace scalar values and whole handler lists.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("progress.enable", true)?
        .set_default("progress.strategy", "first_only")?
        .set_default("progress.channel_capacity", 1024)?
        .set_default("progress.drain_timeout_ms", 5000)?
        .set_default("progress.max_handler_failures", 3)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}

/// Environment overrides, e.g. `PROSCOPE__PROGRESS__STRATEGY=sum_all`.
pub fn environment_source() -> Environment {
    Environment::with_prefix("PROSCOPE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
