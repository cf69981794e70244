//! # Model Configuration
//!
//! The model has exactly one external knob, the observation-noise variance
//! `beta`. The prior weight variance is fixed at [`INIT_VAR`]. Parameters arrive
//! either as a string map (the `Init(params)` lifecycle call) or from a flat TOML
//! file; both paths validate eagerly so that no model exists with an invalid
//! configuration.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Prior variance of every feature weight.
pub const INIT_VAR: f64 = 1.0;

/// Parameter key for the observation-noise variance.
pub const BETA_KEY: &str = "beta";

/// Immutable configuration of an [`EpLogisticRegression`](crate::regression::EpLogisticRegression).
///
/// Only obtainable through the validating constructors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    beta: f64,
    init_var: f64,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required parameter '{0}' was not provided.")]
    MissingParameter(&'static str),
    #[error("Parameter '{key}' has value '{value}', which is not a valid number.")]
    InvalidNumber { key: String, value: String },
    #[error("Parameter '{key}' must be finite and non-negative, but was {value}.")]
    OutOfRange { key: &'static str, value: f64 },
    #[error("Parameter '{key}' in the configuration file has unsupported type '{found}'.")]
    UnsupportedValue { key: String, found: &'static str },
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

impl ModelConfig {
    /// Builds a configuration from an already-parsed `beta`.
    pub fn new(beta: f64) -> Result<Self, ConfigError> {
        if !beta.is_finite() || beta < 0.0 {
            return Err(ConfigError::OutOfRange {
                key: BETA_KEY,
                value: beta,
            });
        }
        Ok(Self {
            beta,
            init_var: INIT_VAR,
        })
    }

    /// Parses the string-encoded parameter map handed to `Init`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        for key in params.keys().filter(|k| k.as_str() != BETA_KEY) {
            log::debug!("Ignoring unrecognized model parameter '{key}'");
        }
        let raw = params
            .get(BETA_KEY)
            .ok_or(ConfigError::MissingParameter(BETA_KEY))?;
        let beta = parse_float(BETA_KEY, raw)?;
        Self::new(beta)
    }

    /// Parses a flat TOML table of parameters, e.g. `beta = 0.1` or `beta = "0.1"`.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(contents)?;
        let mut params = HashMap::with_capacity(table.len());
        for (key, value) in table {
            let encoded = match value {
                toml::Value::String(s) => s,
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Integer(i) => i.to_string(),
                other => {
                    return Err(ConfigError::UnsupportedValue {
                        key,
                        found: other.type_str(),
                    });
                }
            };
            params.insert(key, encoded);
        }
        Self::from_params(&params)
    }

    /// Loads a TOML parameter file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Observation-noise ("click noise") variance added to the score.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Prior variance of a feature weight.
    pub fn init_var(&self) -> f64 {
        self.init_var
    }
}

fn parse_float(key: &str, raw: &str) -> Result<f64, ConfigError> {
    lexical_core::parse::<f64>(raw.trim().as_bytes()).map_err(|_| ConfigError::InvalidNumber {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
