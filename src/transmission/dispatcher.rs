use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dimse::{DimseConfig, DimseError, RemoteNode};
use tracing::{error, info, warn};

use super::status_mapper::http_status_to_dimse;
use super::stow::{build_multipart, multipart_content_type, parse_stow_response};
use super::transport::{
    HttpPoster, HttpRequest, SerializedRecord, SessionTransport, StoreChannel, TransportError,
};
use super::{
    Destination, DimseSessionTransport, ReqwestPoster, StowDestination, TransmissionResult,
};

const PROCESSING_FAILURE: u16 = 0x0110;
const SOP_CLASS_NOT_SUPPORTED: u16 = 0x0122;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordResult {
    pub sop_instance_uid: String,
    pub result: TransmissionResult,
}

/// Either one result per record, in input order, or one for the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    PerRecord(Vec<RecordResult>),
    Aggregate(TransmissionResult),
}

impl DispatchOutcome {
    pub fn result_for(&self, sop_instance_uid: &str) -> Option<&TransmissionResult> {
        match self {
            DispatchOutcome::PerRecord(results) => results
                .iter()
                .find(|r| r.sop_instance_uid == sop_instance_uid)
                .map(|r| &r.result),
            DispatchOutcome::Aggregate(result) => Some(result),
        }
    }

    pub fn all_stored(&self) -> bool {
        match self {
            DispatchOutcome::PerRecord(results) => results.iter().all(|r| r.result.is_stored()),
            DispatchOutcome::Aggregate(result) => result.is_stored(),
        }
    }
}

/// Sends batches of records and normalizes what comes back.
///
/// Every wait on the network is bounded by `timeout`. Nothing is retried.
pub struct Dispatcher {
    sessions: Option<Arc<dyn SessionTransport>>,
    http: Option<Arc<dyn HttpPoster>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: None,
            http: None,
            timeout,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionTransport>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpPoster>) -> Self {
        self.http = Some(http);
        self
    }

    /// Real transports for `destination`
    pub fn for_destination(
        destination: &Destination,
        dimse: &DimseConfig,
    ) -> Result<Self, TransportError> {
        match destination {
            Destination::Dimse(node) => {
                let timeout = node.connect_timeout(dimse).max(dimse.read_timeout());
                Ok(Self::new(timeout)
                    .with_sessions(Arc::new(DimseSessionTransport::new(dimse.clone()))))
            }
            Destination::Stow(stow) => {
                Ok(Self::new(stow.timeout()).with_http(Arc::new(ReqwestPoster::new(stow)?)))
            }
        }
    }

    pub async fn send(
        &self,
        records: &[SerializedRecord],
        destination: &Destination,
    ) -> DispatchOutcome {
        if records.is_empty() {
            return DispatchOutcome::PerRecord(Vec::new());
        }
        info!(
            "Sending {} record(s) to {}",
            records.len(),
            destination.describe()
        );
        match destination {
            Destination::Dimse(node) => match &self.sessions {
                Some(sessions) => self.send_session(sessions.as_ref(), records, node).await,
                None => missing_transport("DIMSE"),
            },
            Destination::Stow(stow) => match &self.http {
                Some(http) => self.send_multipart(http.as_ref(), records, stow).await,
                None => missing_transport("STOW-RS"),
            },
        }
    }

    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }

    async fn send_session(
        &self,
        sessions: &dyn SessionTransport,
        records: &[SerializedRecord],
        node: &RemoteNode,
    ) -> DispatchOutcome {
        let mut contexts: Vec<(String, String)> = Vec::new();
        for record in records {
            let context = record.store_request().presentation_context();
            if !contexts.contains(&context) {
                contexts.push(context);
            }
        }

        let channel = match self.bounded(sessions.open(node, &contexts)).await {
            Ok(channel) => channel,
            Err(e) => {
                error!("Session to {} could not be opened: {}", node.address(), e);
                return DispatchOutcome::Aggregate(error_result(&e));
            }
        };

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let result = match self.bounded(channel.store(record.store_request().clone())).await {
                Ok(code) => TransmissionResult::from_status(code),
                Err(e) => {
                    warn!("Store of {} failed: {}", record.sop_instance_uid(), e);
                    error_result(&e)
                }
            };
            info!("{} -> {}", record.sop_instance_uid(), result);
            results.push(RecordResult {
                sop_instance_uid: record.sop_instance_uid().to_string(),
                result,
            });
        }

        close(channel, self.timeout).await;
        DispatchOutcome::PerRecord(results)
    }

    async fn send_multipart(
        &self,
        http: &dyn HttpPoster,
        records: &[SerializedRecord],
        stow: &StowDestination,
    ) -> DispatchOutcome {
        let (boundary, body) = build_multipart(records.iter().map(|r| r.part10()));
        let request = HttpRequest {
            url: stow.url.clone(),
            content_type: multipart_content_type(&boundary),
            accept: "application/dicom+json".to_string(),
            body,
            basic_auth: stow
                .username
                .clone()
                .map(|user| (user, stow.password.clone())),
        };

        let response = match self.bounded(http.post(request)).await {
            Ok(response) => response,
            Err(e) => {
                error!("STOW-RS request to {} failed: {}", stow.url, e);
                return DispatchOutcome::Aggregate(error_result(&e));
            }
        };
        info!("STOW-RS {} answered HTTP {}", stow.url, response.status);

        let ok = (200..300).contains(&response.status);
        let aggregate = if ok {
            TransmissionResult::Success
        } else {
            let code = http_status_to_dimse(response.status).code();
            TransmissionResult::failure(code, format!("HTTP {}", response.status))
        };

        match parse_stow_response(&response.body) {
            Some(mut parsed) => DispatchOutcome::PerRecord(
                records
                    .iter()
                    .map(|record| {
                        let uid = record.sop_instance_uid().to_string();
                        let result = parsed.remove(&uid).unwrap_or_else(|| {
                            if ok {
                                TransmissionResult::Unknown { code: None }
                            } else {
                                aggregate.clone()
                            }
                        });
                        RecordResult {
                            sop_instance_uid: uid,
                            result,
                        }
                    })
                    .collect(),
            ),
            None => DispatchOutcome::Aggregate(aggregate),
        }
    }
}

async fn close(channel: Box<dyn StoreChannel>, timeout: Duration) {
    match tokio::time::timeout(timeout, channel.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Session release failed: {}", e),
        Err(_) => warn!("Session release timed out after {:?}", timeout),
    }
}

fn error_result(error: &TransportError) -> TransmissionResult {
    if error.is_no_response() {
        return TransmissionResult::NoResponse;
    }
    match error {
        TransportError::Dimse(DimseError::NoPresentationContext { .. }) => {
            TransmissionResult::failure(SOP_CLASS_NOT_SUPPORTED, error.to_string())
        }
        _ => TransmissionResult::failure(PROCESSING_FAILURE, error.to_string()),
    }
}

fn missing_transport(protocol: &str) -> DispatchOutcome {
    error!("No {} transport configured", protocol);
    DispatchOutcome::Aggregate(TransmissionResult::failure(
        PROCESSING_FAILURE,
        format!("No {} transport configured", protocol),
    ))
}
