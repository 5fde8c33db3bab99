//! Part 10 dataset writer and reader.
//!
//! Serializes an in-memory data set with a file meta group in one of the
//! transfer syntaxes the caller picks, reads such a stream back, and
//! converts data sets to and from DICOM JSON.

use dicom_dictionary_std::{tags, uids};
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::{FileDicomObject, InMemDicomObject};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Uncompressed transfer syntaxes a record can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UncompressedSyntax {
    ImplicitVrLittleEndian,
    #[default]
    ExplicitVrLittleEndian,
    ExplicitVrBigEndian,
}

impl UncompressedSyntax {
    pub fn uid(self) -> &'static str {
        match self {
            UncompressedSyntax::ImplicitVrLittleEndian => uids::IMPLICIT_VR_LITTLE_ENDIAN,
            UncompressedSyntax::ExplicitVrLittleEndian => uids::EXPLICIT_VR_LITTLE_ENDIAN,
            UncompressedSyntax::ExplicitVrBigEndian => uids::EXPLICIT_VR_BIG_ENDIAN,
        }
    }

    /// Parse the short names used in configuration files
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "implicitle" | "implicitvrlittleendian" => Some(Self::ImplicitVrLittleEndian),
            "explicitle" | "explicitvrlittleendian" => Some(Self::ExplicitVrLittleEndian),
            "explicitbe" | "explicitvrbigendian" => Some(Self::ExplicitVrBigEndian),
            _ => None,
        }
    }
}

/// Values stamped into the file meta group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implementation {
    pub class_uid: String,
    /// At most 16 characters; longer names are truncated
    pub version_name: String,
}

#[derive(Debug, Error)]
pub enum Part10Error {
    #[error("Data set is missing {0}")]
    MissingAttribute(&'static str),

    #[error("File meta group could not be built: {0}")]
    Meta(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("DICOM JSON conversion error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, Part10Error>;

fn required_str(obj: &InMemDicomObject, tag: dicom_core::Tag, name: &'static str) -> Result<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
        .filter(|s| !s.is_empty())
        .ok_or(Part10Error::MissingAttribute(name))
}

/// Attach a file meta group to `obj` for the given transfer syntax UID.
/// SOP Class and SOP Instance UIDs are taken from the data set.
pub fn with_file_meta(
    obj: &InMemDicomObject,
    transfer_syntax: &str,
    implementation: &Implementation,
) -> Result<FileDicomObject<InMemDicomObject>> {
    let sop_class = required_str(obj, tags::SOP_CLASS_UID, "SOPClassUID")?;
    let sop_instance = required_str(obj, tags::SOP_INSTANCE_UID, "SOPInstanceUID")?;
    let version_name: String = implementation.version_name.chars().take(16).collect();

    obj.clone()
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(transfer_syntax)
                .media_storage_sop_class_uid(sop_class.as_str())
                .media_storage_sop_instance_uid(sop_instance.as_str())
                .implementation_class_uid(implementation.class_uid.as_str())
                .implementation_version_name(version_name.as_str()),
        )
        .map_err(|e| Part10Error::Meta(e.to_string()))
}

/// Serialize to a Part 10 byte stream: preamble, "DICM", meta group, data set
pub fn write_part10_bytes(
    obj: &InMemDicomObject,
    transfer_syntax: &str,
    implementation: &Implementation,
) -> Result<Vec<u8>> {
    let file_obj = with_file_meta(obj, transfer_syntax, implementation)?;
    let mut out = Vec::new();
    file_obj
        .write_all(&mut out)
        .map_err(|e| Part10Error::Write(e.to_string()))?;
    Ok(out)
}

pub fn write_part10(
    path: &Path,
    obj: &InMemDicomObject,
    transfer_syntax: &str,
    implementation: &Implementation,
) -> Result<()> {
    with_file_meta(obj, transfer_syntax, implementation)?
        .write_to_file(path)
        .map_err(|e| Part10Error::Write(e.to_string()))
}

/// Read a Part 10 byte stream. The 128-byte preamble is optional.
pub fn read_part10_bytes(bytes: &[u8]) -> Result<FileDicomObject<InMemDicomObject>> {
    let body = if bytes.len() >= 132 && &bytes[128..132] == b"DICM" {
        &bytes[128..]
    } else {
        bytes
    };
    dicom_object::from_reader(body).map_err(|e| Part10Error::Read(e.to_string()))
}

pub fn read_part10(path: &Path) -> Result<FileDicomObject<InMemDicomObject>> {
    dicom_object::open_file(path).map_err(|e| Part10Error::Read(e.to_string()))
}

pub fn to_json_value(obj: &InMemDicomObject) -> Result<Value> {
    dicom_json::to_value(obj).map_err(|e| Part10Error::Json(format!("{}", e)))
}

pub fn from_json_value(v: &Value) -> Result<InMemDicomObject> {
    dicom_json::from_value(v.clone()).map_err(|e| Part10Error::Json(format!("{}", e)))
}
