//! Delivery of serialized records to an archive.
//!
//! Two strategies share one contract: a DIMSE association carrying one
//! C-STORE per record, or a single STOW-RS multipart POST. Both report
//! through [`TransmissionResult`].

mod dimse_session;
mod dispatcher;
mod result;
pub mod status_mapper;
mod stow;
mod transport;

use std::path::PathBuf;
use std::time::Duration;

use dimse::RemoteNode;
use serde::Deserialize;

pub use dimse_session::DimseSessionTransport;
pub use dispatcher::{DispatchOutcome, Dispatcher, RecordResult};
pub use result::{status_meaning, TransmissionResult};
pub use stow::{build_multipart, parse_stow_response, ReqwestPoster};
pub use transport::{
    HttpPoster, HttpRequest, HttpResponse, SerializedRecord, SessionTransport, StoreChannel,
    TransportError,
};

/// Where records go, tagged by `protocol` in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Destination {
    Dimse(RemoteNode),
    Stow(StowDestination),
}

impl Destination {
    pub fn describe(&self) -> String {
        match self {
            Destination::Dimse(node) => node.address(),
            Destination::Stow(stow) => stow.url.clone(),
        }
    }
}

/// A STOW-RS studies endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StowDestination {
    /// e.g. https://pacs.example.org/dicom-web/studies
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Extra PEM root certificate to trust
    pub ca_pem: Option<PathBuf>,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl StowDestination {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            ca_pem: None,
            verify_tls: default_verify_tls(),
            timeout_secs: default_http_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_verify_tls() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    60
}
