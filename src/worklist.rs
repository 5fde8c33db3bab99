//! Inheriting order (modality worklist) attributes into a record.

use std::collections::HashMap;

use chrono::NaiveDate;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use tracing::{debug, info, warn};

use crate::identity::Uid;
use crate::models::{code_item_from_dataset, read_str, ClinicalImageRecord, CodeItem, PersonName};

/// Coding scheme of the orthodontic photography view codes
pub const OPOR_SCHEME: &str = "99OPOR";

/// The fields an order may contribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    AccessionNumber,
    PatientName,
    PatientId,
    PatientBirthDate,
    PatientSex,
    StudyInstanceUid,
    ReferringPhysicianName,
    RequestingPhysician,
    RequestedProcedureId,
    RequestedProcedureDescription,
    ScheduledProcedureStepId,
    ScheduledProcedureStepDescription,
}

impl OrderField {
    pub const ALL: [OrderField; 12] = [
        OrderField::AccessionNumber,
        OrderField::PatientName,
        OrderField::PatientId,
        OrderField::PatientBirthDate,
        OrderField::PatientSex,
        OrderField::StudyInstanceUid,
        OrderField::ReferringPhysicianName,
        OrderField::RequestingPhysician,
        OrderField::RequestedProcedureId,
        OrderField::RequestedProcedureDescription,
        OrderField::ScheduledProcedureStepId,
        OrderField::ScheduledProcedureStepDescription,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            OrderField::AccessionNumber => "AccessionNumber",
            OrderField::PatientName => "PatientName",
            OrderField::PatientId => "PatientID",
            OrderField::PatientBirthDate => "PatientBirthDate",
            OrderField::PatientSex => "PatientSex",
            OrderField::StudyInstanceUid => "StudyInstanceUID",
            OrderField::ReferringPhysicianName => "ReferringPhysicianName",
            OrderField::RequestingPhysician => "RequestingPhysician",
            OrderField::RequestedProcedureId => "RequestedProcedureID",
            OrderField::RequestedProcedureDescription => "RequestedProcedureDescription",
            OrderField::ScheduledProcedureStepId => "ScheduledProcedureStepID",
            OrderField::ScheduledProcedureStepDescription => "ScheduledProcedureStepDescription",
        }
    }

    fn is_step_level(&self) -> bool {
        matches!(
            self,
            OrderField::ScheduledProcedureStepId | OrderField::ScheduledProcedureStepDescription
        )
    }
}

/// Read-only view of an order record
pub trait OrderRecord {
    fn get(&self, field: OrderField) -> Option<String>;

    fn has(&self, field: OrderField) -> bool {
        self.get(field).is_some()
    }

    /// Scheduled Protocol Code Sequence of the first step
    fn protocol_codes(&self) -> Vec<CodeItem> {
        Vec::new()
    }
}

/// A worklist item; step-level fields come from the first Scheduled
/// Procedure Step item
impl OrderRecord for InMemDicomObject {
    fn get(&self, field: OrderField) -> Option<String> {
        let tag = match field {
            OrderField::AccessionNumber => tags::ACCESSION_NUMBER,
            OrderField::PatientName => tags::PATIENT_NAME,
            OrderField::PatientId => tags::PATIENT_ID,
            OrderField::PatientBirthDate => tags::PATIENT_BIRTH_DATE,
            OrderField::PatientSex => tags::PATIENT_SEX,
            OrderField::StudyInstanceUid => tags::STUDY_INSTANCE_UID,
            OrderField::ReferringPhysicianName => tags::REFERRING_PHYSICIAN_NAME,
            OrderField::RequestingPhysician => tags::REQUESTING_PHYSICIAN,
            OrderField::RequestedProcedureId => tags::REQUESTED_PROCEDURE_ID,
            OrderField::RequestedProcedureDescription => tags::REQUESTED_PROCEDURE_DESCRIPTION,
            OrderField::ScheduledProcedureStepId => tags::SCHEDULED_PROCEDURE_STEP_ID,
            OrderField::ScheduledProcedureStepDescription => {
                tags::SCHEDULED_PROCEDURE_STEP_DESCRIPTION
            }
        };
        if field.is_step_level() {
            first_step(self).and_then(|step| read_str(step, tag))
        } else {
            read_str(self, tag)
        }
    }

    fn protocol_codes(&self) -> Vec<CodeItem> {
        first_step(self)
            .and_then(|step| step.element(tags::SCHEDULED_PROTOCOL_CODE_SEQUENCE).ok())
            .and_then(|e| e.items())
            .map(|items| items.iter().filter_map(code_item_from_dataset).collect())
            .unwrap_or_default()
    }
}

fn first_step(obj: &InMemDicomObject) -> Option<&InMemDicomObject> {
    obj.element(tags::SCHEDULED_PROCEDURE_STEP_SEQUENCE)
        .ok()
        .and_then(|e| e.items())
        .and_then(|items| items.first())
}

/// Orders given as keyword/value pairs, keyed by DICOM keyword
impl OrderRecord for HashMap<String, String> {
    fn get(&self, field: OrderField) -> Option<String> {
        HashMap::get(self, field.keyword())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Copy order fields into `record` where the record has no value yet.
///
/// The order's Study Instance UID always wins over a generated one. The
/// performed step description prefers the local study description, then
/// the step description, then the requested procedure description.
/// Returns the number of fields copied.
pub fn inherit_order(record: &mut ClinicalImageRecord, order: Option<&dyn OrderRecord>) -> usize {
    let Some(order) = order else {
        warn!("No order record supplied; nothing inherited");
        return 0;
    };
    let mut copied = 0;

    let mut fill = |target: &mut Option<String>, field: OrderField| {
        if target.is_none() {
            if let Some(value) = order.get(field) {
                *target = Some(value);
                copied += 1;
            }
        }
    };
    fill(&mut record.order.accession_number, OrderField::AccessionNumber);
    fill(&mut record.order.requesting_physician, OrderField::RequestingPhysician);
    fill(&mut record.order.requested_procedure_id, OrderField::RequestedProcedureId);
    fill(
        &mut record.order.requested_procedure_description,
        OrderField::RequestedProcedureDescription,
    );
    fill(&mut record.order.scheduled_step_id, OrderField::ScheduledProcedureStepId);
    fill(
        &mut record.order.scheduled_step_description,
        OrderField::ScheduledProcedureStepDescription,
    );

    if record.patient.name.is_empty() {
        if let Some(name) = order.get(OrderField::PatientName) {
            record.patient.name = PersonName::parse(&name);
            copied += 1;
        }
    }
    if record.patient.id.is_empty() {
        if let Some(id) = order.get(OrderField::PatientId) {
            record.patient.id = id;
            copied += 1;
        }
    }
    if record.patient.sex.is_empty() {
        if let Some(sex) = order.get(OrderField::PatientSex) {
            record.patient.sex = sex;
            copied += 1;
        }
    }
    if record.patient.birth_date.is_none() {
        if let Some(raw) = order.get(OrderField::PatientBirthDate) {
            match NaiveDate::parse_from_str(&raw, "%Y%m%d") {
                Ok(date) => {
                    record.patient.birth_date = Some(date);
                    copied += 1;
                }
                Err(e) => warn!("Ignoring order PatientBirthDate '{}': {}", raw, e),
            }
        }
    }
    if record.referring_provider.is_empty() {
        if let Some(name) = order.get(OrderField::ReferringPhysicianName) {
            record.referring_provider = PersonName::parse(&name);
            copied += 1;
        }
    }

    if let Some(raw) = order.get(OrderField::StudyInstanceUid) {
        match Uid::new(raw.as_str()) {
            Ok(uid) => {
                record.identity.study = uid;
                copied += 1;
            }
            Err(e) => warn!("Ignoring order StudyInstanceUID: {}", e),
        }
    }

    if record.order.scheduled_protocol_codes.is_empty() {
        let codes = order.protocol_codes();
        if !codes.is_empty() {
            record.order.scheduled_protocol_codes = codes;
            copied += 1;
        }
    }

    if record.order.performed_step_description.is_none() {
        record.order.performed_step_description = record
            .study_description
            .clone()
            .or_else(|| record.order.scheduled_step_description.clone())
            .or_else(|| record.order.requested_procedure_description.clone());
    }

    debug!("Inherited {} fields from order record", copied);
    copied
}

/// First scheduled protocol code: the image type the order asks for
pub fn image_type_code(order: &dyn OrderRecord) -> Option<CodeItem> {
    let code = order.protocol_codes().into_iter().next();
    if code.is_none() {
        warn!("ScheduledProtocolCodeSequence not found in order record");
    }
    code
}

/// View keyword of a 99OPOR code; other schemes have none
pub fn opor_view_keyword(code: &CodeItem) -> Option<String> {
    if code.scheme() == OPOR_SCHEME {
        Some(code.value().to_string())
    } else {
        info!(
            "Code {} from scheme {} is not a {} view code",
            code.value(),
            code.scheme(),
            OPOR_SCHEME
        );
        None
    }
}
