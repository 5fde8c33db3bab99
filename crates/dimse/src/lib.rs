//! DIMSE (DICOM Message Service Element) service class user
//!
//! This crate provides the outbound half of DICOM networking used to deliver
//! instances to an archive: association negotiation, C-ECHO verification and
//! C-STORE over a single association per batch.
//!
//! # Features
//! - C-ECHO and C-STORE over the DICOM upper layer protocol (`dicom-ul`)
//! - One association carries a whole batch; each instance is one C-STORE
//! - Raw DIMSE status codes are returned to the caller unchanged

pub mod config;
pub mod error;
pub mod scu;
pub mod types;

// Re-export commonly used types
pub use config::{DimseConfig, RemoteNode};
pub use error::{DimseError, Result};
pub use scu::{DimseScu, StoreSession};
pub use types::{DimseCommand, DimseStatus, StoreRequest};

/// DIMSE protocol version
pub const DIMSE_VERSION: &str = "0.2.0";

/// Default DICOM port (non-TLS)
pub const DEFAULT_DIMSE_PORT: u16 = 11112;

/// Verification SOP Class
pub const VERIFICATION_SOP_CLASS: &str = "1.2.840.10008.1.1";
