//! From image bytes and metadata to stored records.
//!
//! Each record is built, coded and serialized on its own: a failure in one
//! never stops its siblings.


use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use part10::{Implementation, UncompressedSyntax};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::code_table::CodeSource;
use crate::coding::CodeInjector;
use crate::config::{ConfigError, EngineConfig};
use crate::identity::{IdentityError, IdentityManager, UidRoots};
use crate::models::{
    implementation_version_name, normalize_view_keyword, serialize, ClinicalImageRecord, CodeItem,
    Metadata, MetadataError, SerializationError, SerializeOptions, IMPLEMENTATION_VERSION,
};
use crate::pixel::{EncodeOptions, ImageDecoder, PixelError};
use crate::transmission::{
    DispatchOutcome, Destination, Dispatcher, SerializedRecord, TransportError,
};
use crate::worklist::{image_type_code, inherit_order, opor_view_keyword, OrderRecord};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Pixel(#[from] PixelError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One photograph to encode
#[derive(Clone, Copy)]
pub struct ImageInput<'a> {
    pub bytes: &'a [u8],
    pub metadata: &'a Metadata,
    pub order: Option<&'a dyn OrderRecord>,
    /// Defaults to now, in local time
    pub captured_at: Option<DateTime<FixedOffset>>,
}

impl<'a> ImageInput<'a> {
    pub fn new(bytes: &'a [u8], metadata: &'a Metadata) -> Self {
        Self {
            bytes,
            metadata,
            order: None,
            captured_at: None,
        }
    }

    pub fn with_order(mut self, order: &'a dyn OrderRecord) -> Self {
        self.order = Some(order);
        self
    }

    pub fn captured_at(mut self, at: DateTime<FixedOffset>) -> Self {
        self.captured_at = Some(at);
        self
    }
}

/// Engine choices, usually read from `[engine]`
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub roots: UidRoots,
    pub private_view_cid: String,
    pub creator_uid: Option<String>,
    pub syntax: UncompressedSyntax,
    pub encode: EncodeOptions,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            roots: engine.roots(),
            private_view_cid: engine.private_view_cid,
            creator_uid: None,
            syntax: UncompressedSyntax::default(),
            encode: EncodeOptions::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            roots: config.roots(),
            private_view_cid: config.private_view_cid.clone(),
            creator_uid: config.creator_uid.clone(),
            syntax: config.syntax()?,
            encode: EncodeOptions {
                jpeg_recompress_quality: config.jpeg_recompress_quality,
            },
        })
    }
}

/// Result of [`Engine::build_and_send`]
#[derive(Debug)]
pub struct BatchReport {
    /// Index into the input batch and why that record was not sent
    pub rejected: Vec<(usize, EncodeError)>,
    pub outcome: DispatchOutcome,
}

pub struct Engine {
    codes: Arc<dyn CodeSource + Send + Sync>,
    decoder: Arc<dyn ImageDecoder>,
    identities: IdentityManager,
    injector: CodeInjector,
    settings: EngineSettings,
    serialize: SerializeOptions,
}

impl Engine {
    pub fn new(
        codes: Arc<dyn CodeSource + Send + Sync>,
        decoder: Arc<dyn ImageDecoder>,
        settings: EngineSettings,
    ) -> Self {
        let implementation = Implementation {
            class_uid: settings.roots.implementation_class(IMPLEMENTATION_VERSION),
            version_name: implementation_version_name(),
        };
        let default_creator = settings.roots.base().to_string();
        Self {
            codes,
            decoder,
            identities: IdentityManager::new(settings.roots.clone()),
            injector: CodeInjector::new(settings.private_view_cid.clone(), default_creator),
            serialize: SerializeOptions {
                syntax: settings.syntax,
                implementation,
            },
            settings,
        }
    }

    pub fn injector(&self) -> &CodeInjector {
        &self.injector
    }

    pub fn identities(&self) -> &IdentityManager {
        &self.identities
    }

    /// Encode pixels, code the view, inherit the order and settle the
    /// identifiers. The record is ready to serialize.
    pub fn build_record(&self, input: &ImageInput<'_>) -> Result<ClinicalImageRecord, EncodeError> {
        let captured_at = input
            .captured_at
            .unwrap_or_else(|| Local::now().fixed_offset());
        let mut record =
            ClinicalImageRecord::from_metadata(input.metadata, &self.identities, captured_at)?;

        let block = crate::pixel::encode(input.bytes, self.decoder.as_ref(), &self.settings.encode)?;
        record.set_pixel_payload(block);

        let ordered_code = input.order.and_then(image_type_code);
        let view_keyword = record
            .view_keyword
            .clone()
            .or_else(|| ordered_code.as_ref().and_then(opor_view_keyword))
            .map(|k| normalize_view_keyword(&k));

        match view_keyword {
            Some(keyword) => {
                let report = self.injector.inject(&mut record, &keyword, self.codes.as_ref());
                if !report.unresolved.is_empty() {
                    warn!(
                        "View {} coded with {} unresolved keyword(s): {}",
                        keyword,
                        report.unresolved.len(),
                        report.unresolved.join(", ")
                    );
                }
                let private = self
                    .codes
                    .get_code(&keyword)
                    .map(CodeItem::from_entry)
                    .or(ordered_code);
                if let Some(code) = private {
                    self.injector.set_private_view_code(
                        &mut record,
                        &code,
                        self.settings.creator_uid.as_deref(),
                    );
                }
            }
            None => warn!(
                "No view keyword for {}; record left without clinical coding",
                record.identity.sop_instance
            ),
        }

        if input.order.is_some() {
            inherit_order(&mut record, input.order);
        }

        let check = self.identities.ensure_distinct(&mut record.identity)?;
        if check.was_repaired() {
            warn!("Identifiers of {} were repaired", record.identity.sop_instance);
        }
        Ok(record)
    }

    pub fn serialize(&self, record: &ClinicalImageRecord) -> Result<Vec<u8>, EncodeError> {
        Ok(serialize(record, &self.serialize)?)
    }

    /// Build and serialize one record
    pub fn encode(&self, input: &ImageInput<'_>) -> Result<Vec<u8>, EncodeError> {
        let record = self.build_record(input)?;
        self.serialize(&record)
    }

    /// Encode every input independently; results keep input order
    pub fn encode_batch(&self, inputs: &[ImageInput<'_>]) -> Vec<Result<Vec<u8>, EncodeError>> {
        inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                self.encode(input).map_err(|e| {
                    error!("Record {} of batch could not be encoded: {}", index, e);
                    e
                })
            })
            .collect()
    }

    /// Encode a batch and send whatever encoded cleanly in one dispatch
    pub async fn build_and_send(
        &self,
        inputs: &[ImageInput<'_>],
        dispatcher: &Dispatcher,
        destination: &Destination,
    ) -> BatchReport {
        let mut rejected = Vec::new();
        let mut records = Vec::new();
        for (index, encoded) in self.encode_batch(inputs).into_iter().enumerate() {
            match encoded.and_then(|bytes| Ok(SerializedRecord::from_part10(bytes)?)) {
                Ok(record) => records.push(record),
                Err(e) => rejected.push((index, e)),
            }
        }
        info!(
            "Batch of {}: {} encoded, {} rejected",
            inputs.len(),
            records.len(),
            rejected.len()
        );

        let outcome = dispatcher.send(&records, destination).await;
        BatchReport { rejected, outcome }
    }
}
