//! TOML configuration.
//!
//! ```toml
//! [engine]
//! uid_root = "1.3.6.1.4.1.61741.11.2"
//! transfer_syntax = "explicit-le"
//!
//! [code_tables]
//! views = "resources/views.csv"
//! codes = "resources/codes.csv"
//!
//! [logging]
//! level = "info"
//!
//! [destinations.pacs]
//! protocol = "dimse"
//! ae_title = "ORTHANC"
//! host = "127.0.0.1"
//! port = 4242
//! ```

mod engine_config;
mod logging_config;

use std::collections::HashMap;
use std::path::Path;

use dimse::{DimseConfig, DimseError};
use serde::Deserialize;
use thiserror::Error;

use crate::transmission::Destination;

pub use engine_config::{CodeTablesConfig, EngineConfig};
pub use logging_config::LoggingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid UID root '{root}': {reason}")]
    InvalidUidRoot { root: String, reason: String },

    #[error("Unknown transfer syntax '{0}'")]
    UnknownTransferSyntax(String),

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidJpegQuality(u8),

    #[error("Invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("log_to_file is set but log_file_path is empty")]
    MissingLogFilePath,

    #[error("Logging already initialized: {0}")]
    LoggingInit(String),

    #[error("code_tables needs both 'views' and 'codes'")]
    IncompleteCodeTables,

    #[error("Destination '{name}': {reason}")]
    InvalidDestination { name: String, reason: String },

    #[error("Unknown destination '{0}'")]
    UnknownDestination(String),

    #[error(transparent)]
    Dimse(#[from] DimseError),
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub code_tables: CodeTablesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dimse: DimseConfig,
    #[serde(default)]
    pub destinations: HashMap<String, Destination>,
}

impl Config {
    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.code_tables.validate()?;
        self.logging.validate()?;
        self.dimse.validate()?;

        for (name, destination) in &self.destinations {
            let invalid = |reason: String| ConfigError::InvalidDestination {
                name: name.clone(),
                reason,
            };
            match destination {
                Destination::Dimse(node) => node.validate().map_err(|e| invalid(e.to_string()))?,
                Destination::Stow(stow) => {
                    let url = url::Url::parse(&stow.url).map_err(|e| invalid(e.to_string()))?;
                    if !matches!(url.scheme(), "http" | "https") {
                        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
                    }
                    if stow.password.is_some() && stow.username.is_none() {
                        return Err(invalid("password given without username".to_string()));
                    }
                    if stow.timeout_secs == 0 {
                        return Err(invalid("timeout_secs must be positive".to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn destination(&self, name: &str) -> Result<&Destination, ConfigError> {
        self.destinations
            .get(name)
            .ok_or_else(|| ConfigError::UnknownDestination(name.to_string()))
    }
}
