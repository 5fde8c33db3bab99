use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::ConfigError;

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. "info" or "vlphoto=debug,dimse=info"
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default)]
    pub log_file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_to_file: false,
            log_file_path: String::new(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        EnvFilter::try_new(&self.level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.level.clone()))?;
        if self.log_to_file && self.log_file_path.trim().is_empty() {
            return Err(ConfigError::MissingLogFilePath);
        }
        Ok(())
    }
}

fn default_level() -> String {
    "info".to_string()
}
