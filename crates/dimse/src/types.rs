//! Common types for DIMSE operations

use dicom_encoding::transfer_syntax::TransferSyntaxIndex;
use dicom_object::{FileDicomObject, InMemDicomObject};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use serde::{Deserialize, Serialize};

use crate::error::{DimseError, Result};

/// DIMSE command types issued by this service class user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimseCommand {
    /// C-ECHO command
    Echo,
    /// C-STORE command
    Store,
}

impl DimseCommand {
    /// Command Field (0000,0100) value of the request
    pub fn command_field(self) -> u16 {
        match self {
            DimseCommand::Echo => 0x0030,
            DimseCommand::Store => 0x0001,
        }
    }
}

/// DIMSE operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    /// Operation completed successfully
    Success,
    /// Operation is pending (more responses to follow)
    Pending,
    /// Operation cancelled by user
    Cancel,
    /// Operation failed with error
    Failure(u16), // DICOM status code
    /// Warning occurred during operation
    Warning(u16), // DICOM status code
}

impl DimseStatus {
    /// Classify a raw Status (0000,0900) value following PS3.7 Annex C
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => DimseStatus::Success,
            0xFF00 | 0xFF01 => DimseStatus::Pending,
            0xFE00 => DimseStatus::Cancel,
            0x0001 | 0x0107 | 0x0116 | 0xB000..=0xBFFF => DimseStatus::Warning(code),
            _ => DimseStatus::Failure(code),
        }
    }

    /// Raw status code
    pub fn code(&self) -> u16 {
        match self {
            DimseStatus::Success => 0x0000,
            DimseStatus::Pending => 0xFF00,
            DimseStatus::Cancel => 0xFE00,
            DimseStatus::Failure(code) | DimseStatus::Warning(code) => *code,
        }
    }
}

/// One instance ready to travel in a C-STORE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    /// Affected SOP Class UID
    pub sop_class_uid: String,

    /// Affected SOP Instance UID
    pub sop_instance_uid: String,

    /// Transfer syntax the data set bytes are encoded in
    pub transfer_syntax: String,

    /// Data set without preamble or file meta group
    pub dataset: Vec<u8>,
}

impl StoreRequest {
    /// Build a request from a Part 10 byte stream, with or without the
    /// 128-byte preamble
    pub fn from_part10(bytes: &[u8]) -> Result<Self> {
        let body = if bytes.len() >= 132 && &bytes[128..132] == b"DICM" {
            &bytes[128..]
        } else {
            bytes
        };
        let object = dicom_object::from_reader(body)
            .map_err(|e| DimseError::DicomParsing(e.to_string()))?;
        Self::from_object(&object)
    }

    /// Build a request from an opened file object, re-encoding its data set
    /// in the transfer syntax declared by its meta group
    pub fn from_object(object: &FileDicomObject<InMemDicomObject>) -> Result<Self> {
        let meta = object.meta();
        let transfer_syntax = meta.transfer_syntax().to_string();
        let ts = TransferSyntaxRegistry.get(&transfer_syntax).ok_or_else(|| {
            DimseError::DicomObject(format!("Unknown transfer syntax {}", transfer_syntax))
        })?;

        let mut dataset = Vec::new();
        object
            .write_dataset_with_ts(&mut dataset, ts)
            .map_err(|e| DimseError::DicomObject(e.to_string()))?;

        Ok(Self {
            sop_class_uid: meta.media_storage_sop_class_uid().to_string(),
            sop_instance_uid: meta.media_storage_sop_instance_uid().to_string(),
            transfer_syntax,
            dataset,
        })
    }

    /// Presentation context this request needs: abstract syntax plus the
    /// single transfer syntax its bytes are already in
    pub fn presentation_context(&self) -> (String, String) {
        (self.sop_class_uid.clone(), self.transfer_syntax.clone())
    }
}
