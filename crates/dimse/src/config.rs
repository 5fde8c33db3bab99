//! Configuration types for DIMSE services

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::DEFAULT_DIMSE_PORT;

/// Configuration for the local DIMSE service class user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimseConfig {
    /// Local (calling) Application Entity Title
    #[serde(default = "default_local_aet")]
    pub local_aet: String,

    /// Maximum PDU size in bytes
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Socket read timeout in milliseconds, bounds each wait for a response
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

/// Configuration for a remote DICOM node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Remote Application Entity Title
    pub ae_title: String,

    /// Remote host address
    pub host: String,

    /// Remote port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection timeout in milliseconds (overrides global setting)
    pub connect_timeout_ms: Option<u64>,

    /// Maximum PDU size for this node (overrides global setting)
    pub max_pdu: Option<u32>,
}

impl Default for DimseConfig {
    fn default() -> Self {
        Self {
            local_aet: default_local_aet(),
            max_pdu: default_max_pdu(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl DimseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_ae_title(&self.local_aet, "Local")?;

        if self.max_pdu < 16384 || self.max_pdu > 131072 {
            return Err(crate::error::DimseError::config(
                "Max PDU size must be between 16384 and 131072 bytes",
            ));
        }

        if self.read_timeout_ms == 0 {
            return Err(crate::error::DimseError::config(
                "Read timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl RemoteNode {
    /// Create a new remote node configuration
    pub fn new(ae_title: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            ae_title: ae_title.into(),
            host: host.into(),
            port,
            connect_timeout_ms: None,
            max_pdu: None,
        }
    }

    /// Set connection timeout for this node
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = Some(timeout_ms);
        self
    }

    /// Address in the `AE@host:port` form understood by the upper layer
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.ae_title, self.host, self.port)
    }

    /// Effective connection timeout, falling back to the global setting
    pub fn connect_timeout(&self, config: &DimseConfig) -> Duration {
        self.connect_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.connect_timeout())
    }

    /// Validate the remote node configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_ae_title(&self.ae_title, "Remote")?;

        if self.host.is_empty() {
            return Err(crate::error::DimseError::config(
                "Remote host cannot be empty",
            ));
        }

        if self.port == 0 {
            return Err(crate::error::DimseError::config(
                "Remote port must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn validate_ae_title(ae_title: &str, which: &str) -> crate::error::Result<()> {
    if ae_title.is_empty() || ae_title.len() > 16 {
        return Err(crate::error::DimseError::InvalidAeTitle(format!(
            "{} AE title must be 1-16 characters, got {:?}",
            which, ae_title
        )));
    }
    if ae_title.contains('\\') || ae_title.chars().any(|c| c.is_control()) {
        return Err(crate::error::DimseError::InvalidAeTitle(format!(
            "{} AE title contains forbidden characters: {:?}",
            which, ae_title
        )));
    }
    Ok(())
}

// Default value functions
fn default_local_aet() -> String {
    "VLPHOTO".to_string()
}

fn default_port() -> u16 {
    DEFAULT_DIMSE_PORT
}

fn default_max_pdu() -> u32 {
    16384
}

fn default_connect_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_read_timeout() -> u64 {
    60_000
}
