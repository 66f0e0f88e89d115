//! Job catalog configuration for playtime
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Departments grouping jobs
//! - Jobs with play-time, whitelist and species requirements
//! - Validation with clear error messages

mod catalog;
mod requirements;
mod schema;
mod validation;

pub use catalog::*;
pub use requirements::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate a job catalog from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Catalog> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Loading job catalog");
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate a job catalog from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Catalog> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Catalog::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;
