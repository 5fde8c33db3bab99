//! The VL Photographic Image record and everything it carries.
//!
//! [`ClinicalImageRecord`] is plain data. [`to_dataset`] derives the DICOM
//! attribute set from it and [`serialize`] turns that into Part 10 bytes.

mod code_item;
mod dataset;
mod metadata;
mod person_name;
mod record;
mod series;

pub use code_item::{CodeItem, PrivateExtension, CODE_MEANING_MAX, CODE_VALUE_MAX};
pub(crate) use dataset::read_str;
pub use dataset::{code_item_dataset, code_item_from_dataset, serialize, to_dataset, SerializationError, SerializeOptions};
pub use metadata::{normalize_view_keyword, Metadata, MetadataError};
pub use person_name::PersonName;
pub use record::{
    ClinicalImageRecord, CodedSequence, ContextItem, ImageType, OrderDetails, Patient,
    SequenceRole, ViewAttributes,
};
pub use series::{PhotoSeries, PhotoStudy};

/// VL Photographic Image Storage
pub const VL_PHOTOGRAPHIC_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.77.1.4";

/// External-camera photography
pub const MODALITY: &str = "XC";

/// UTF-8
pub const SPECIFIC_CHARACTER_SET: &str = "ISO_IR 192";

/// Default Study ID, Series Number and Instance Number
pub const DEFAULT_ID_NUMBER: &str = "000";

/// Context identifier of the private view-type code
pub const PRIVATE_VIEW_CID: &str = "4063";

pub const IMPLEMENTATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// "VLPHOTO_051": project name and digits of the version, at most 16 characters
pub fn implementation_version_name() -> String {
    let digits: String = IMPLEMENTATION_VERSION
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    format!("VLPHOTO_{}", digits).chars().take(16).collect()
}
