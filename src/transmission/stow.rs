use std::collections::HashMap;

use async_trait::async_trait;
use dicom_core::Tag;
use dicom_object::InMemDicomObject;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};

use super::transport::{HttpPoster, HttpRequest, HttpResponse, TransportError};
use super::{StowDestination, TransmissionResult};

const REFERENCED_SOP_SEQUENCE: Tag = Tag(0x0008, 0x1199);
const FAILED_SOP_SEQUENCE: Tag = Tag(0x0008, 0x1198);
const REFERENCED_SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x1155);
const WARNING_REASON: Tag = Tag(0x0008, 0x1196);
const FAILURE_REASON: Tag = Tag(0x0008, 0x1197);

/// Frame Part 10 streams as one multipart/related body.
/// Returns the boundary and the body.
pub fn build_multipart<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> (String, Vec<u8>) {
    let boundary = format!("dicomweb_{}", uuid::Uuid::new_v4());
    let mut buf: Vec<u8> = Vec::new();
    for part in parts {
        buf.extend_from_slice(format!("--{}\r\n", &boundary).as_bytes());
        buf.extend_from_slice(b"Content-Type: application/dicom\r\n\r\n");
        buf.extend_from_slice(part);
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(format!("--{}--\r\n", &boundary).as_bytes());
    (boundary, buf)
}

pub(crate) fn multipart_content_type(boundary: &str) -> String {
    format!(
        "multipart/related; type=\"application/dicom\"; boundary={}",
        boundary
    )
}

/// Per-instance outcome from a STOW-RS response body (DICOM JSON), keyed
/// by SOP Instance UID. `None` when the body is not a store response or
/// references no instances.
pub fn parse_stow_response(body: &[u8]) -> Option<HashMap<String, TransmissionResult>> {
    if body.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| debug!("STOW-RS response is not JSON: {}", e))
        .ok()?;
    // Some servers wrap the data set in an array
    let value = match value {
        serde_json::Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    };
    let response = part10::from_json_value(&value)
        .map_err(|e| warn!("Unreadable STOW-RS response: {}", e))
        .ok()?;
    if response.element(REFERENCED_SOP_SEQUENCE).is_err()
        && response.element(FAILED_SOP_SEQUENCE).is_err()
    {
        debug!("STOW-RS response carries no instance references");
        return None;
    }

    let mut results = HashMap::new();
    for item in sequence_items(&response, REFERENCED_SOP_SEQUENCE) {
        let Some(uid) = text(item, REFERENCED_SOP_INSTANCE_UID) else {
            continue;
        };
        let result = match status(item, WARNING_REASON) {
            Some(code) => TransmissionResult::Warning {
                code,
                meaning: super::status_meaning(code).to_string(),
            },
            None => TransmissionResult::Success,
        };
        results.insert(uid, result);
    }
    for item in sequence_items(&response, FAILED_SOP_SEQUENCE) {
        let Some(uid) = text(item, REFERENCED_SOP_INSTANCE_UID) else {
            continue;
        };
        let result = match status(item, FAILURE_REASON) {
            Some(code) => TransmissionResult::failure(code, super::status_meaning(code)),
            None => TransmissionResult::failure(0x0110, "Processing failure"),
        };
        results.insert(uid, result);
    }
    Some(results)
}

fn sequence_items(obj: &InMemDicomObject, tag: Tag) -> &[InMemDicomObject] {
    obj.element(tag)
        .ok()
        .and_then(|e| e.items())
        .unwrap_or(&[])
}

fn text(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
        .filter(|s| !s.is_empty())
}

fn status(obj: &InMemDicomObject, tag: Tag) -> Option<u16> {
    obj.element(tag).ok().and_then(|e| e.to_int::<u16>().ok())
}

/// [`HttpPoster`] backed by reqwest, with the destination's TLS trust
pub struct ReqwestPoster {
    client: reqwest::Client,
}

impl ReqwestPoster {
    pub fn new(destination: &StowDestination) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().timeout(destination.timeout());

        if let Some(path) = &destination.ca_pem {
            let pem = std::fs::read(path)
                .map_err(|e| TransportError::Tls(format!("{}: {}", path.display(), e)))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| TransportError::Tls(format!("{}: {}", path.display(), e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if !destination.verify_tls {
            warn!("TLS certificate verification disabled for {}", destination.url);
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpPoster for ReqwestPoster {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, request.content_type)
            .header(ACCEPT, request.accept)
            .body(request.body);
        if let Some((user, password)) = request.basic_auth {
            builder = builder.basic_auth(user, password);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Unreachable(format!("{} (timed out)", request.url))
            } else if e.is_connect() {
                TransportError::Unreachable(request.url.clone())
            } else {
                TransportError::Http(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
