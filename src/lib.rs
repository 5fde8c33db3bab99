//! Encode clinical photographs as DICOM VL Photographic Image objects,
//! code them from the clinical vocabulary tables and deliver them to an
//! archive over DIMSE or STOW-RS.

pub mod code_table;
pub mod coding;
pub mod config;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod pixel;
pub mod transmission;
pub mod worklist;

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::{ConfigError, LoggingConfig};

pub use pipeline::{Engine, EngineSettings, EncodeError, ImageInput};

/// Install the global subscriber: stdout always, plus a file when
/// `log_to_file` is set. Call once per process.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|_| ConfigError::InvalidLogLevel(config.level.clone()))?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true);

    let file_layer = if config.log_to_file {
        let file = std::fs::File::create(&config.log_file_path).map_err(|source| {
            ConfigError::Io {
                path: config.log_file_path.clone(),
                source,
            }
        })?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::LoggingInit(e.to_string()))
}
