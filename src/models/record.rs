use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};

use super::{CodeItem, PersonName, DEFAULT_ID_NUMBER};
use crate::identity::RecordIdentity;
use crate::pixel::PixelBlock;

/// Coded sequences filled from view-table columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SequenceRole {
    Device,
    AnatomicRegion,
    ViewCode,
    PrimaryAnatomicStructure,
}

impl SequenceRole {
    pub const ALL: [SequenceRole; 4] = [
        SequenceRole::Device,
        SequenceRole::AnatomicRegion,
        SequenceRole::ViewCode,
        SequenceRole::PrimaryAnatomicStructure,
    ];

    /// View-table column and attribute keyword of the sequence
    pub fn keyword(&self) -> &'static str {
        match self {
            SequenceRole::Device => "DeviceSequence",
            SequenceRole::AnatomicRegion => "AnatomicRegionSequence",
            SequenceRole::ViewCode => "ViewCodeSequence",
            SequenceRole::PrimaryAnatomicStructure => "PrimaryAnatomicStructureSequence",
        }
    }

    /// Column whose codes nest in the first item of this sequence
    pub fn modifier_keyword(&self) -> Option<&'static str> {
        match self {
            SequenceRole::Device => None,
            SequenceRole::AnatomicRegion => Some("AnatomicRegionModifierSequence"),
            SequenceRole::ViewCode => Some("ViewModifierCodeSequence"),
            SequenceRole::PrimaryAnatomicStructure => {
                Some("PrimaryAnatomicStructureModifierSequence")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodedSequence {
    pub items: Vec<CodeItem>,
    /// Nested under the first item when written
    pub modifiers: Vec<CodeItem>,
}

impl CodedSequence {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An item of the Acquisition Context Sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextItem {
    Code {
        concept_name: CodeItem,
        concept: CodeItem,
    },
    Numeric {
        concept_name: CodeItem,
        value: String,
        unit: CodeItem,
    },
}

impl ContextItem {
    pub fn concept_name(&self) -> &CodeItem {
        match self {
            ContextItem::Code { concept_name, .. } | ContextItem::Numeric { concept_name, .. } => {
                concept_name
            }
        }
    }

    pub fn value_type(&self) -> &'static str {
        match self {
            ContextItem::Code { .. } => "CODE",
            ContextItem::Numeric { .. } => "NUMERIC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patient {
    pub name: PersonName,
    pub id: String,
    /// "M", "F", "O" or empty
    pub sex: String,
    pub birth_date: Option<NaiveDate>,
}

/// Value 1 and 2 of Image Type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageType {
    #[default]
    OriginalPrimary,
    DerivedPrimary,
    OriginalSecondary,
    DerivedSecondary,
}

impl ImageType {
    pub fn values(&self) -> [&'static str; 2] {
        match self {
            ImageType::OriginalPrimary => ["ORIGINAL", "PRIMARY"],
            ImageType::DerivedPrimary => ["DERIVED", "PRIMARY"],
            ImageType::OriginalSecondary => ["ORIGINAL", "SECONDARY"],
            ImageType::DerivedSecondary => ["DERIVED", "SECONDARY"],
        }
    }
}

/// Attributes derived from the view table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewAttributes {
    pub image_comments: Option<String>,
    /// Row and column direction
    pub patient_orientation: Vec<String>,
    pub image_laterality: Option<String>,
}

/// Worklist attributes carried over to the image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDetails {
    pub accession_number: Option<String>,
    pub requested_procedure_id: Option<String>,
    pub requested_procedure_description: Option<String>,
    pub requesting_physician: Option<String>,
    pub scheduled_step_id: Option<String>,
    pub scheduled_step_description: Option<String>,
    pub scheduled_protocol_codes: Vec<CodeItem>,
    pub performed_step_description: Option<String>,
}

impl OrderDetails {
    /// Whether a Request Attributes item has anything to say
    pub fn has_request_attributes(&self) -> bool {
        self.requested_procedure_id.is_some()
            || self.requested_procedure_description.is_some()
            || self.scheduled_step_id.is_some()
            || self.scheduled_step_description.is_some()
            || !self.scheduled_protocol_codes.is_empty()
    }
}

/// One clinical photograph and its context.
///
/// The record holds values only. Dataset attributes are derived by
/// [`to_dataset`](super::to_dataset) at serialization time, so nothing
/// here can drift out of sync with the pixel payload.
#[derive(Debug, Clone)]
pub struct ClinicalImageRecord {
    pub identity: RecordIdentity,
    /// Dashes removed, e.g. "EV01"
    pub view_keyword: Option<String>,
    pub image_type: ImageType,

    pub patient: Patient,
    pub referring_provider: PersonName,
    pub operator: Option<PersonName>,
    pub institution_name: Option<String>,
    pub manufacturer: Option<String>,

    pub study_description: Option<String>,
    pub series_description: Option<String>,
    pub study_id: String,
    pub series_number: String,
    pub instance_number: String,

    pub captured_at: DateTime<FixedOffset>,
    pub study_datetime: Option<DateTime<FixedOffset>>,
    pub series_datetime: Option<DateTime<FixedOffset>>,

    pub pixel_payload: Option<PixelBlock>,
    pub burned_in_annotation: bool,

    pub view: ViewAttributes,
    pub coded_sequences: BTreeMap<SequenceRole, CodedSequence>,
    pub acquisition_context: Vec<ContextItem>,

    pub treatment_event_type: Option<String>,
    pub days_after_event: Option<u32>,

    pub order: OrderDetails,
}

impl ClinicalImageRecord {
    pub fn new(identity: RecordIdentity, captured_at: DateTime<FixedOffset>) -> Self {
        Self {
            identity,
            view_keyword: None,
            image_type: ImageType::default(),
            patient: Patient::default(),
            referring_provider: PersonName::default(),
            operator: None,
            institution_name: None,
            manufacturer: None,
            study_description: None,
            series_description: None,
            study_id: DEFAULT_ID_NUMBER.to_string(),
            series_number: DEFAULT_ID_NUMBER.to_string(),
            instance_number: DEFAULT_ID_NUMBER.to_string(),
            captured_at,
            study_datetime: None,
            series_datetime: None,
            pixel_payload: None,
            burned_in_annotation: false,
            view: ViewAttributes::default(),
            coded_sequences: BTreeMap::new(),
            acquisition_context: Vec::new(),
            treatment_event_type: None,
            days_after_event: None,
            order: OrderDetails::default(),
        }
    }

    /// Lossy when the pixel payload was produced by a lossy codec
    pub fn lossy(&self) -> bool {
        self.pixel_payload
            .as_ref()
            .is_some_and(|block| block.attributes().is_lossy())
    }

    pub fn set_pixel_payload(&mut self, block: PixelBlock) {
        self.pixel_payload = Some(block);
    }

    pub fn sequence(&self, role: SequenceRole) -> Option<&CodedSequence> {
        self.coded_sequences.get(&role)
    }

    pub fn sequence_mut(&mut self, role: SequenceRole) -> &mut CodedSequence {
        self.coded_sequences.entry(role).or_default()
    }

    pub fn study_datetime(&self) -> DateTime<FixedOffset> {
        self.study_datetime.unwrap_or(self.captured_at)
    }

    pub fn series_datetime(&self) -> DateTime<FixedOffset> {
        self.series_datetime.unwrap_or(self.captured_at)
    }
}
