//! Subcommand implementations.

pub mod compose;
pub mod doctor;
pub mod instincts;
pub mod rules;

use std::path::Path;
use tessera_config::{AppConfig, ConfigError};

/// Load config from `path`, or the default location when unset.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(p) => AppConfig::load_with_env(p),
        None => AppConfig::load(),
    }
}
