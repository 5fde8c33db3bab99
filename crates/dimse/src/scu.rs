//! Service Class User (SCU) implementation for outbound DIMSE operations
//!
//! The upper layer association is blocking, so every association lives on
//! its own worker thread. [`StoreSession`] is the async handle to that
//! thread: jobs go in over a channel and each job answers on a oneshot.

use std::io::Write;
use std::thread::JoinHandle;

use dicom_core::{dicom_value, DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::entries::IMPLICIT_VR_LITTLE_ENDIAN;
use dicom_ul::association::client::ClientAssociationOptions;
use dicom_ul::pdu::{PDataValue, PDataValueType, Pdu};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::{DimseConfig, RemoteNode};
use crate::types::{DimseCommand, DimseStatus, StoreRequest};
use crate::{DimseError, Result, VERIFICATION_SOP_CLASS};

/// DIMSE Service Class User
pub struct DimseScu {
    config: DimseConfig,
}

impl DimseScu {
    /// Create a new SCU with the given configuration
    pub fn new(config: DimseConfig) -> Self {
        Self { config }
    }

    /// Local configuration
    pub fn config(&self) -> &DimseConfig {
        &self.config
    }

    /// Send a C-ECHO request to a remote node and return its raw status
    pub async fn echo(&self, node: &RemoteNode) -> Result<u16> {
        info!("Sending C-ECHO to {}@{}:{}", node.ae_title, node.host, node.port);

        node.validate()?;

        let contexts = vec![(
            VERIFICATION_SOP_CLASS.to_string(),
            IMPLICIT_VR_LITTLE_ENDIAN.uid().to_string(),
        )];
        let options = self.association_options(node, &contexts);
        let address = node.address();

        let status = tokio::task::spawn_blocking(move || -> Result<u16> {
            let mut association = options
                .establish_with(&address)
                .map_err(association_error)?;
            let pc_id = association
                .presentation_contexts()
                .first()
                .map(|pc| pc.id)
                .ok_or_else(|| DimseError::NoPresentationContext {
                    sop_class: VERIFICATION_SOP_CLASS.to_string(),
                    transfer_syntax: IMPLICIT_VR_LITTLE_ENDIAN.uid().to_string(),
                })?;

            association
                .send(&command_pdu(pc_id, &echo_command(1))?)
                .map_err(DimseError::ul)?;
            let status = status_from_pdu(association.receive().map_err(DimseError::ul)?)?;

            if let Err(e) = association.release() {
                warn!("C-ECHO association release failed: {}", e);
            }
            Ok(status)
        })
        .await
        .map_err(|e| DimseError::internal(format!("C-ECHO worker failed: {}", e)))??;

        match DimseStatus::from_code(status) {
            DimseStatus::Success => info!("C-ECHO completed successfully"),
            other => warn!("C-ECHO answered with {:?}", other),
        }
        Ok(status)
    }

    /// Open one association for a batch of C-STORE requests.
    ///
    /// `contexts` lists (SOP class, transfer syntax) pairs; each becomes one
    /// proposed presentation context carrying exactly that transfer syntax.
    pub async fn open_store(
        &self,
        node: &RemoteNode,
        contexts: &[(String, String)],
    ) -> Result<StoreSession> {
        info!(
            "Opening C-STORE association to {}@{}:{} ({} presentation contexts)",
            node.ae_title,
            node.host,
            node.port,
            contexts.len()
        );

        node.validate()?;
        if contexts.is_empty() {
            return Err(DimseError::config("At least one presentation context is required"));
        }

        let options = self.association_options(node, contexts);
        let proposals = contexts.to_vec();
        let address = node.address();
        let peer = address.clone();

        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let (jobs_tx, mut jobs_rx) = mpsc::channel::<Job>(1);

        let worker = std::thread::Builder::new()
            .name("dimse-store".to_string())
            .spawn(move || {
                let mut association = match options.establish_with(&address) {
                    Ok(association) => association,
                    Err(e) => {
                        let _ = ready_tx.send(Err(association_error(e)));
                        return;
                    }
                };

                // Contexts are numbered 1, 3, 5, ... in proposal order
                let accepted: Vec<(u8, String, String)> = proposals
                    .iter()
                    .enumerate()
                    .filter_map(|(index, (sop_class, ts))| {
                        let id = (2 * index + 1) as u8;
                        association
                            .presentation_contexts()
                            .iter()
                            .any(|pc| pc.id == id)
                            .then(|| (id, sop_class.clone(), ts.clone()))
                    })
                    .collect();
                debug!("Accepted presentation contexts: {:?}", accepted);

                let _ = ready_tx.send(Ok(()));
                let mut message_id: u16 = 1;

                while let Some(job) = jobs_rx.blocking_recv() {
                    match job {
                        Job::Store { request, reply } => {
                            let mut store_one = || -> Result<u16> {
                                let pc_id = accepted
                                    .iter()
                                    .find(|(_, sop_class, ts)| {
                                        *sop_class == request.sop_class_uid && *ts == request.transfer_syntax
                                    })
                                    .map(|(id, _, _)| *id)
                                    .ok_or_else(|| DimseError::NoPresentationContext {
                                        sop_class: request.sop_class_uid.clone(),
                                        transfer_syntax: request.transfer_syntax.clone(),
                                    })?;

                                debug!(
                                    "C-STORE {} (message {}, context {}, {} bytes)",
                                    request.sop_instance_uid,
                                    message_id,
                                    pc_id,
                                    request.dataset.len()
                                );
                                association
                                    .send(&command_pdu(pc_id, &store_command(&request, message_id))?)
                                    .map_err(DimseError::ul)?;
                                {
                                    let mut writer = association.send_pdata(pc_id);
                                    writer.write_all(&request.dataset)?;
                                }
                                status_from_pdu(association.receive().map_err(DimseError::ul)?)
                            };
                            let result = store_one();
                            message_id = message_id.wrapping_add(1);
                            let _ = reply.send(result);
                        }
                        Job::Release { reply } => {
                            let _ = reply.send(association.release().map_err(DimseError::ul));
                            return;
                        }
                    }
                }

                // Handle dropped without an explicit release
                if let Err(e) = association.release() {
                    warn!("Association release after drop failed: {}", e);
                }
            })
            .map_err(DimseError::Network)?;

        match ready_rx.await {
            Ok(Ok(())) => {
                info!("C-STORE association established with {}", peer);
                Ok(StoreSession {
                    jobs: Some(jobs_tx),
                    worker: Some(worker),
                    peer,
                })
            }
            Ok(Err(e)) => {
                error!("C-STORE association with {} failed: {}", peer, e);
                Err(e)
            }
            Err(_) => Err(DimseError::internal("Association worker exited during setup")),
        }
    }

    fn association_options(
        &self,
        node: &RemoteNode,
        contexts: &[(String, String)],
    ) -> ClientAssociationOptions<'static> {
        let mut options = ClientAssociationOptions::new()
            .calling_ae_title(self.config.local_aet.clone())
            .called_ae_title(node.ae_title.clone())
            .max_pdu_length(node.max_pdu.unwrap_or(self.config.max_pdu))
            .read_timeout(self.config.read_timeout())
            .write_timeout(self.config.read_timeout());
        for (sop_class, ts) in contexts {
            options = options.with_presentation_context(sop_class.clone(), vec![ts.clone()]);
        }
        options
    }
}

enum Job {
    Store {
        request: StoreRequest,
        reply: oneshot::Sender<Result<u16>>,
    },
    Release {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Async handle to an open C-STORE association
pub struct StoreSession {
    jobs: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    peer: String,
}

impl StoreSession {
    /// Send one instance and wait for the raw C-STORE-RSP status
    pub async fn store(&self, request: StoreRequest) -> Result<u16> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| DimseError::SessionClosed(self.peer.clone()))?;
        let (reply, response) = oneshot::channel();
        jobs.send(Job::Store { request, reply })
            .await
            .map_err(|_| DimseError::SessionClosed(self.peer.clone()))?;
        response
            .await
            .map_err(|_| DimseError::SessionClosed(self.peer.clone()))?
    }

    /// Release the association and wait for the worker to finish
    pub async fn release(mut self) -> Result<()> {
        let result = match self.jobs.take() {
            Some(jobs) => {
                let (reply, response) = oneshot::channel();
                if jobs.send(Job::Release { reply }).await.is_err() {
                    Err(DimseError::SessionClosed(self.peer.clone()))
                } else {
                    response
                        .await
                        .map_err(|_| DimseError::SessionClosed(self.peer.clone()))?
                }
            }
            None => Ok(()),
        };

        if let Some(worker) = self.worker.take() {
            let joined = tokio::task::spawn_blocking(move || worker.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("Association worker for {} did not exit cleanly", self.peer);
            }
        }

        info!("C-STORE association with {} released", self.peer);
        result
    }
}

fn store_command(request: &StoreRequest, message_id: u16) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(request.sop_class_uid.as_str()),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_value!(U16, [DimseCommand::Store.command_field()]),
        ),
        DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [message_id])),
        DataElement::new(tags::PRIORITY, VR::US, dicom_value!(U16, [0x0000])),
        DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [0x0000])),
        DataElement::new(
            tags::AFFECTED_SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(request.sop_instance_uid.as_str()),
        ),
    ])
}

fn echo_command(message_id: u16) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(VERIFICATION_SOP_CLASS),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_value!(U16, [DimseCommand::Echo.command_field()]),
        ),
        DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [message_id])),
        // No data set follows
        DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [0x0101])),
    ])
}

fn command_pdu(pc_id: u8, command: &InMemDicomObject) -> Result<Pdu> {
    let mut data = Vec::new();
    command
        .write_dataset_with_ts(&mut data, &IMPLICIT_VR_LITTLE_ENDIAN.erased())
        .map_err(|e| DimseError::DicomObject(e.to_string()))?;

    Ok(Pdu::PData {
        data: vec![PDataValue {
            presentation_context_id: pc_id,
            value_type: PDataValueType::Command,
            is_last: true,
            data,
        }],
    })
}

fn status_from_pdu(pdu: Pdu) -> Result<u16> {
    match pdu {
        Pdu::PData { data } => {
            let value = data
                .first()
                .ok_or_else(|| DimseError::operation_failed("Empty P-DATA response"))?;
            let response = InMemDicomObject::read_dataset_with_ts(
                value.data.as_slice(),
                &IMPLICIT_VR_LITTLE_ENDIAN.erased(),
            )
            .map_err(|e| DimseError::DicomParsing(e.to_string()))?;
            response
                .element(tags::STATUS)
                .map_err(|e| DimseError::DicomParsing(e.to_string()))?
                .to_int::<u16>()
                .map_err(|e| DimseError::DicomParsing(e.to_string()))
        }
        Pdu::AbortRQ { source } => Err(DimseError::SessionClosed(format!(
            "association aborted: {:?}",
            source
        ))),
        Pdu::ReleaseRQ => Err(DimseError::SessionClosed(
            "peer requested release".to_string(),
        )),
        other => Err(DimseError::operation_failed(format!(
            "Unexpected PDU in response: {:?}",
            other
        ))),
    }
}

fn association_error(err: impl std::fmt::Display) -> DimseError {
    let message = err.to_string();
    if message.to_lowercase().contains("reject") {
        DimseError::AssociationRejected(message)
    } else {
        DimseError::DicomUl(message)
    }
}
