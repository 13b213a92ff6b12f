//! Server configuration parsed from environment variables.
//!
//! Optional (all have defaults):
//! - `PORT`: listen port, default 3000
//! - `PUBLIC_DIR`: static files served as the fallback route, default `public`
//! - `REFERENCE_LENGTH`: grid distance between join index 0 and 1, default 100
//! - `MAX_POINTING_DEVIATION`: pointing cone half-width in degrees, default 30
//!
//! A value that is present but malformed is an error, not a silent default.

use std::path::PathBuf;

use crate::engine::GridConfig;
use crate::engine::room::{DEFAULT_MAX_POINTING_DEVIATION, DEFAULT_REFERENCE_LENGTH};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_DIR: &str = "public";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} is not a valid {expected}: {value:?}")]
    Parse { key: &'static str, expected: &'static str, value: String },
    #[error("{key} out of range: {value} ({constraint})")]
    OutOfRange { key: &'static str, value: f64, constraint: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub public_dir: PathBuf,
    pub grid: GridConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR), grid: GridConfig::default() }
    }
}

impl Config {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but malformed or out of
    /// range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Parse {
                key: "PORT",
                expected: "port number",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };
        let public_dir = lookup("PUBLIC_DIR").map_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR), PathBuf::from);

        let reference_length = parse_f64(&lookup, "REFERENCE_LENGTH", DEFAULT_REFERENCE_LENGTH)?;
        if reference_length <= 0.0 {
            return Err(ConfigError::OutOfRange { key: "REFERENCE_LENGTH", value: reference_length, constraint: "> 0" });
        }

        let max_pointing_deviation = parse_f64(&lookup, "MAX_POINTING_DEVIATION", DEFAULT_MAX_POINTING_DEVIATION)?;
        if max_pointing_deviation <= 0.0 || max_pointing_deviation > 180.0 {
            return Err(ConfigError::OutOfRange {
                key: "MAX_POINTING_DEVIATION",
                value: max_pointing_deviation,
                constraint: "within (0, 180]",
            });
        }

        Ok(Self { port, public_dir, grid: GridConfig { reference_length, max_pointing_deviation } })
    }
}

fn parse_f64(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ConfigError::Parse { key, expected: "finite number", value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
