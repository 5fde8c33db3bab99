use std::time::Duration;

use async_trait::async_trait;
use dimse::{DimseError, RemoteNode, StoreRequest};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Dimse(#[from] DimseError),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Could not reach {0}")]
    Unreachable(String),

    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),
}

impl TransportError {
    /// The destination never answered, as opposed to refusing
    pub fn is_no_response(&self) -> bool {
        match self {
            TransportError::Dimse(e) => e.is_no_response(),
            TransportError::Unreachable(_) | TransportError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// A record ready to send: the Part 10 stream for HTTP and the bare data
/// set for DIMSE
#[derive(Debug, Clone)]
pub struct SerializedRecord {
    request: StoreRequest,
    part10: Vec<u8>,
}

impl SerializedRecord {
    pub fn from_part10(part10: Vec<u8>) -> Result<Self, TransportError> {
        let request = StoreRequest::from_part10(&part10)
            .map_err(|e| TransportError::InvalidRecord(e.to_string()))?;
        Ok(Self { request, part10 })
    }

    pub fn new(request: StoreRequest, part10: Vec<u8>) -> Self {
        Self { request, part10 }
    }

    pub fn sop_instance_uid(&self) -> &str {
        &self.request.sop_instance_uid
    }

    pub fn store_request(&self) -> &StoreRequest {
        &self.request
    }

    pub fn part10(&self) -> &[u8] {
        &self.part10
    }
}

/// Opens stateful store sessions
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn open(
        &self,
        node: &RemoteNode,
        contexts: &[(String, String)],
    ) -> Result<Box<dyn StoreChannel>, TransportError>;
}

/// One open session; each store is one unit of work
#[async_trait]
pub trait StoreChannel: Send + Sync {
    /// Raw status of the store response
    async fn store(&self, request: StoreRequest) -> Result<u16, TransportError>;

    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub content_type: String,
    pub accept: String,
    pub body: Vec<u8>,
    pub basic_auth: Option<(String, Option<String>)>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Issues one HTTP POST
#[async_trait]
pub trait HttpPoster: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
