use chrono::{DateTime, FixedOffset};
use dicom_core::value::{DataSetSequence, PixelFragmentSequence};
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use part10::{Implementation, UncompressedSyntax};
use thiserror::Error;

use super::{
    ClinicalImageRecord, CodeItem, CodedSequence, ContextItem, PrivateExtension, SequenceRole,
    CODE_VALUE_MAX, MODALITY, SPECIFIC_CHARACTER_SET, VL_PHOTOGRAPHIC_IMAGE_STORAGE,
};
use crate::pixel::{PixelBlock, PixelData};

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Record has no pixel payload")]
    MissingPixelData,

    #[error("Malformed pixel attributes: {0}")]
    MalformedPixelAttributes(&'static str),

    #[error("Study, Series and SOP Instance UIDs are not distinct")]
    IdentityNotDistinct,

    #[error(transparent)]
    Part10(#[from] part10::Part10Error),
}

/// Output choices for [`serialize`]
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Used when the pixel payload is native; compressed payloads always
    /// take their own encapsulated syntax
    pub syntax: UncompressedSyntax,
    pub implementation: Implementation,
}

/// Derive the full VL Photographic Image data set from a record.
///
/// Pure: the record is not touched and the same record always yields the
/// same attributes.
pub fn to_dataset(record: &ClinicalImageRecord) -> Result<InMemDicomObject, SerializationError> {
    let pixels = record
        .pixel_payload
        .as_ref()
        .ok_or(SerializationError::MissingPixelData)?;
    if let Some(reason) = pixels.attributes().malformed_reason() {
        return Err(SerializationError::MalformedPixelAttributes(reason));
    }
    let id = &record.identity;
    if id.study == id.series || id.study == id.sop_instance || id.series == id.sop_instance {
        return Err(SerializationError::IdentityNotDistinct);
    }

    let mut obj = InMemDicomObject::new_empty();

    put_str(&mut obj, tags::SPECIFIC_CHARACTER_SET, VR::CS, SPECIFIC_CHARACTER_SET);
    put_strs(&mut obj, tags::IMAGE_TYPE, VR::CS, &record.image_type.values());
    put_str(&mut obj, tags::SOP_CLASS_UID, VR::UI, VL_PHOTOGRAPHIC_IMAGE_STORAGE);
    put_str(&mut obj, tags::SOP_INSTANCE_UID, VR::UI, id.sop_instance.as_str());
    put_str(&mut obj, tags::STUDY_INSTANCE_UID, VR::UI, id.study.as_str());
    put_str(&mut obj, tags::SERIES_INSTANCE_UID, VR::UI, id.series.as_str());
    put_str(&mut obj, tags::MODALITY, VR::CS, MODALITY);

    put_dates(&mut obj, record);

    // General Study, Patient and Equipment
    put_opt(&mut obj, tags::ACCESSION_NUMBER, VR::SH, record.order.accession_number.as_deref());
    put_str(&mut obj, tags::REFERRING_PHYSICIAN_NAME, VR::PN, &record.referring_provider.to_dicom());
    put_str(&mut obj, tags::STUDY_ID, VR::SH, &record.study_id);
    put_str(&mut obj, tags::SERIES_NUMBER, VR::IS, &record.series_number);
    put_str(&mut obj, tags::INSTANCE_NUMBER, VR::IS, &record.instance_number);
    put_opt(&mut obj, tags::MANUFACTURER, VR::LO, record.manufacturer.as_deref());
    if let Some(name) = &record.institution_name {
        put_str(&mut obj, tags::INSTITUTION_NAME, VR::LO, name);
    }
    if let Some(text) = &record.study_description {
        put_str(&mut obj, tags::STUDY_DESCRIPTION, VR::LO, text);
    }
    if let Some(text) = &record.series_description {
        put_str(&mut obj, tags::SERIES_DESCRIPTION, VR::LO, text);
    }
    if let Some(operator) = &record.operator {
        put_str(&mut obj, tags::OPERATORS_NAME, VR::PN, &operator.to_dicom());
    }

    let patient = &record.patient;
    put_str(&mut obj, tags::PATIENT_NAME, VR::PN, &patient.name.to_dicom());
    put_str(&mut obj, tags::PATIENT_ID, VR::LO, &patient.id);
    let birth_date = patient.birth_date.map(|d| d.format("%Y%m%d").to_string());
    put_opt(&mut obj, tags::PATIENT_BIRTH_DATE, VR::DA, birth_date.as_deref());
    put_str(&mut obj, tags::PATIENT_SEX, VR::CS, &patient.sex);

    // View-derived attributes
    if !record.view.patient_orientation.is_empty() {
        let values: Vec<&str> = record.view.patient_orientation.iter().map(String::as_str).collect();
        put_strs(&mut obj, tags::PATIENT_ORIENTATION, VR::CS, &values);
    }
    if let Some(laterality) = &record.view.image_laterality {
        put_str(&mut obj, tags::IMAGE_LATERALITY, VR::CS, laterality);
    }
    if let Some(comments) = &record.view.image_comments {
        put_str(&mut obj, tags::IMAGE_COMMENTS, VR::LT, comments);
    }

    put_str(&mut obj, tags::QUALITY_CONTROL_IMAGE, VR::CS, "NO");
    put_str(
        &mut obj,
        tags::BURNED_IN_ANNOTATION,
        VR::CS,
        if record.burned_in_annotation { "YES" } else { "NO" },
    );

    put_pixels(&mut obj, pixels);

    for role in SequenceRole::ALL {
        if let Some(sequence) = record.sequence(role).filter(|s| !s.is_empty()) {
            put_coded_sequence(&mut obj, role, sequence);
        }
    }

    let context: Vec<InMemDicomObject> = record
        .acquisition_context
        .iter()
        .map(context_item_dataset)
        .collect();
    put_sequence(&mut obj, tags::ACQUISITION_CONTEXT_SEQUENCE, context);

    put_order(&mut obj, record);

    Ok(obj)
}

/// Derive the data set and write it as a Part 10 stream
pub fn serialize(
    record: &ClinicalImageRecord,
    options: &SerializeOptions,
) -> Result<Vec<u8>, SerializationError> {
    let obj = to_dataset(record)?;
    let syntax = record
        .pixel_payload
        .as_ref()
        .and_then(|block| block.syntax().encapsulated_uid())
        .unwrap_or(options.syntax.uid());
    Ok(part10::write_part10_bytes(&obj, syntax, &options.implementation)?)
}

/// A code sequence item: value, scheme, meaning and any extension fields
pub fn code_item_dataset(item: &CodeItem) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    if item.value().chars().count() > CODE_VALUE_MAX {
        put_str(&mut obj, tags::LONG_CODE_VALUE, VR::UC, item.value());
    } else {
        put_str(&mut obj, tags::CODE_VALUE, VR::SH, item.value());
    }
    put_str(&mut obj, tags::CODING_SCHEME_DESIGNATOR, VR::SH, item.scheme());
    put_str(&mut obj, tags::CODE_MEANING, VR::LO, item.meaning());

    if let Some(ext) = item.private() {
        put_str(&mut obj, tags::CONTEXT_IDENTIFIER, VR::CS, &ext.context_identifier);
        put_str(
            &mut obj,
            tags::CONTEXT_GROUP_EXTENSION_FLAG,
            VR::CS,
            if ext.extension_flag { "Y" } else { "N" },
        );
        if let Some(uid) = &ext.creator_uid {
            put_str(&mut obj, tags::CONTEXT_GROUP_EXTENSION_CREATOR_UID, VR::UI, uid);
        }
        if let Some(version) = &ext.local_version {
            put_str(&mut obj, tags::CONTEXT_GROUP_LOCAL_VERSION, VR::DT, version);
        }
    }
    obj
}

/// Read a code sequence item back; `None` without a code value or scheme
pub fn code_item_from_dataset(obj: &InMemDicomObject) -> Option<CodeItem> {
    let value = read_str(obj, tags::CODE_VALUE).or_else(|| read_str(obj, tags::LONG_CODE_VALUE))?;
    let scheme = read_str(obj, tags::CODING_SCHEME_DESIGNATOR)?;
    let meaning = read_str(obj, tags::CODE_MEANING).unwrap_or_default();
    let item = CodeItem::new(value, scheme, meaning);

    match read_str(obj, tags::CONTEXT_IDENTIFIER) {
        Some(context_identifier) => Some(item.with_private(PrivateExtension {
            context_identifier,
            extension_flag: read_str(obj, tags::CONTEXT_GROUP_EXTENSION_FLAG).as_deref() == Some("Y"),
            creator_uid: read_str(obj, tags::CONTEXT_GROUP_EXTENSION_CREATOR_UID),
            local_version: read_str(obj, tags::CONTEXT_GROUP_LOCAL_VERSION),
        })),
        None => Some(item),
    }
}

pub(crate) fn read_str(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
        .filter(|s| !s.is_empty())
}

fn context_item_dataset(item: &ContextItem) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    put_str(&mut obj, tags::VALUE_TYPE, VR::CS, item.value_type());
    put_sequence(
        &mut obj,
        tags::CONCEPT_NAME_CODE_SEQUENCE,
        vec![code_item_dataset(item.concept_name())],
    );
    match item {
        ContextItem::Code { concept, .. } => {
            put_sequence(&mut obj, tags::CONCEPT_CODE_SEQUENCE, vec![code_item_dataset(concept)]);
        }
        ContextItem::Numeric { value, unit, .. } => {
            put_str(&mut obj, tags::NUMERIC_VALUE, VR::DS, value);
            put_sequence(
                &mut obj,
                tags::MEASUREMENT_UNITS_CODE_SEQUENCE,
                vec![code_item_dataset(unit)],
            );
        }
    }
    obj
}

fn put_coded_sequence(obj: &mut InMemDicomObject, role: SequenceRole, sequence: &CodedSequence) {
    let mut items: Vec<InMemDicomObject> = sequence.items.iter().map(code_item_dataset).collect();
    if let (Some(first), Some(modifier_tag)) = (items.first_mut(), modifier_tag(role)) {
        if !sequence.modifiers.is_empty() {
            let modifiers = sequence.modifiers.iter().map(code_item_dataset).collect();
            put_sequence(first, modifier_tag, modifiers);
        }
    }
    put_sequence(obj, sequence_tag(role), items);
}

pub(crate) fn sequence_tag(role: SequenceRole) -> Tag {
    match role {
        SequenceRole::Device => tags::DEVICE_SEQUENCE,
        SequenceRole::AnatomicRegion => tags::ANATOMIC_REGION_SEQUENCE,
        SequenceRole::ViewCode => tags::VIEW_CODE_SEQUENCE,
        SequenceRole::PrimaryAnatomicStructure => tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE,
    }
}

fn modifier_tag(role: SequenceRole) -> Option<Tag> {
    match role {
        SequenceRole::Device => None,
        SequenceRole::AnatomicRegion => Some(tags::ANATOMIC_REGION_MODIFIER_SEQUENCE),
        SequenceRole::ViewCode => Some(tags::VIEW_MODIFIER_CODE_SEQUENCE),
        SequenceRole::PrimaryAnatomicStructure => {
            Some(tags::PRIMARY_ANATOMIC_STRUCTURE_MODIFIER_SEQUENCE)
        }
    }
}

fn put_dates(obj: &mut InMemDicomObject, record: &ClinicalImageRecord) {
    let study = record.study_datetime();
    let series = record.series_datetime();
    let captured = record.captured_at;

    put_str(obj, tags::STUDY_DATE, VR::DA, &da(&study));
    put_str(obj, tags::STUDY_TIME, VR::TM, &tm(&study));
    put_str(obj, tags::SERIES_DATE, VR::DA, &da(&series));
    put_str(obj, tags::SERIES_TIME, VR::TM, &tm(&series));
    put_str(obj, tags::CONTENT_DATE, VR::DA, &da(&captured));
    put_str(obj, tags::CONTENT_TIME, VR::TM, &tm(&captured));
    put_str(obj, tags::ACQUISITION_DATE, VR::DA, &da(&captured));
    put_str(obj, tags::ACQUISITION_TIME, VR::TM, &tm(&captured));
    put_str(obj, tags::ACQUISITION_DATE_TIME, VR::DT, &dt(&captured));
    put_str(obj, tags::TIMEZONE_OFFSET_FROM_UTC, VR::SH, &captured.format("%z").to_string());
}

fn put_pixels(obj: &mut InMemDicomObject, block: &PixelBlock) {
    let attrs = block.attributes();
    put_u16(obj, tags::SAMPLES_PER_PIXEL, attrs.samples_per_pixel());
    put_str(obj, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, attrs.photometric().as_str());
    if let Some(planar) = attrs.planar_configuration() {
        put_u16(obj, tags::PLANAR_CONFIGURATION, planar);
    }
    put_u16(obj, tags::ROWS, attrs.rows());
    put_u16(obj, tags::COLUMNS, attrs.columns());
    put_u16(obj, tags::BITS_ALLOCATED, attrs.bits_allocated());
    put_u16(obj, tags::BITS_STORED, attrs.bits_stored());
    put_u16(obj, tags::HIGH_BIT, attrs.high_bit());
    put_u16(obj, tags::PIXEL_REPRESENTATION, 0);

    if let Some(flag) = attrs.lossy_image_compression() {
        put_str(obj, tags::LOSSY_IMAGE_COMPRESSION, VR::CS, flag);
    }
    if let Some(method) = attrs.compression_method() {
        put_str(obj, tags::LOSSY_IMAGE_COMPRESSION_METHOD, VR::CS, method.as_str());
    }

    match block.data() {
        PixelData::Native(bytes) => {
            obj.put(DataElement::new(
                tags::PIXEL_DATA,
                VR::OB,
                PrimitiveValue::U8(bytes.clone().into()),
            ));
        }
        PixelData::Encapsulated(fragments) => {
            obj.put(DataElement::new(
                tags::PIXEL_DATA,
                VR::OB,
                PixelFragmentSequence::new_fragments(fragments.clone()),
            ));
        }
    }
}

fn put_order(obj: &mut InMemDicomObject, record: &ClinicalImageRecord) {
    let order = &record.order;
    if let Some(physician) = &order.requesting_physician {
        put_str(obj, tags::REQUESTING_PHYSICIAN, VR::PN, physician);
    }
    if let Some(text) = &order.performed_step_description {
        put_str(obj, tags::PERFORMED_PROCEDURE_STEP_DESCRIPTION, VR::LO, text);
    }
    if !order.has_request_attributes() {
        return;
    }

    let mut item = InMemDicomObject::new_empty();
    let fields = [
        (tags::REQUESTED_PROCEDURE_ID, VR::SH, &order.requested_procedure_id),
        (tags::REQUESTED_PROCEDURE_DESCRIPTION, VR::LO, &order.requested_procedure_description),
        (tags::SCHEDULED_PROCEDURE_STEP_ID, VR::SH, &order.scheduled_step_id),
        (tags::SCHEDULED_PROCEDURE_STEP_DESCRIPTION, VR::LO, &order.scheduled_step_description),
    ];
    for (tag, vr, value) in fields {
        if let Some(value) = value {
            put_str(&mut item, tag, vr, value);
        }
    }
    if !order.scheduled_protocol_codes.is_empty() {
        let codes = order.scheduled_protocol_codes.iter().map(code_item_dataset).collect();
        put_sequence(&mut item, tags::SCHEDULED_PROTOCOL_CODE_SEQUENCE, codes);
    }
    put_sequence(obj, tags::REQUEST_ATTRIBUTES_SEQUENCE, vec![item]);
}

fn da(value: &DateTime<FixedOffset>) -> String {
    value.format("%Y%m%d").to_string()
}

fn tm(value: &DateTime<FixedOffset>) -> String {
    value.format("%H%M%S%.6f").to_string()
}

/// DT with fractional seconds and UTC offset
pub(crate) fn dt(value: &DateTime<FixedOffset>) -> String {
    value.format("%Y%m%d%H%M%S%.6f%z").to_string()
}

fn put_str(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: &str) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

fn put_strs(obj: &mut InMemDicomObject, tag: Tag, vr: VR, values: &[&str]) {
    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    obj.put(DataElement::new(tag, vr, PrimitiveValue::Strs(values.into())));
}

/// Type 2: written empty when unknown
fn put_opt(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: Option<&str>) {
    match value {
        Some(value) => put_str(obj, tag, vr, value),
        None => {
            obj.put(DataElement::new(tag, vr, PrimitiveValue::Empty));
        }
    }
}

fn put_u16(obj: &mut InMemDicomObject, tag: Tag, value: u16) {
    obj.put(DataElement::new(tag, VR::US, PrimitiveValue::from(value)));
}

fn put_sequence(obj: &mut InMemDicomObject, tag: Tag, items: Vec<InMemDicomObject>) {
    obj.put(DataElement::new(tag, VR::SQ, DataSetSequence::from(items)));
}
