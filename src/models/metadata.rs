use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;
use tracing::warn;

use super::{ClinicalImageRecord, PersonName};
use crate::identity::{IdentityError, IdentityManager, Uid};

/// Flat key/value description of one photograph, as found in import CSVs
pub type Metadata = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Invalid {key}: {source}")]
    Uid {
        key: &'static str,
        #[source]
        source: IdentityError,
    },

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Strip separators from a view keyword: "EV-01" becomes "EV01"
pub fn normalize_view_keyword(keyword: &str) -> String {
    keyword.trim().chars().filter(|c| *c != '-').collect()
}

fn value<'a>(meta: &'a Metadata, key: &str) -> Option<&'a str> {
    meta.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn owned(meta: &Metadata, key: &str) -> Option<String> {
    value(meta, key).map(str::to_string)
}

fn person(meta: &Metadata, prefix: &str) -> PersonName {
    PersonName::new(
        value(meta, &format!("{prefix}_lastname")).unwrap_or_default(),
        value(meta, &format!("{prefix}_firstname")).unwrap_or_default(),
    )
}

fn uid(meta: &Metadata, key: &'static str) -> Result<Option<Uid>, MetadataError> {
    value(meta, key)
        .map(|v| Uid::new(v).map_err(|source| MetadataError::Uid { key, source }))
        .transpose()
}

impl ClinicalImageRecord {
    /// Build a record from a metadata map.
    ///
    /// Fresh identifiers are generated for anything the map does not carry.
    /// Unparseable dates and numbers are dropped with a warning; only a
    /// malformed UID is an error.
    pub fn from_metadata(
        meta: &Metadata,
        identities: &IdentityManager,
        captured_at: DateTime<FixedOffset>,
    ) -> Result<Self, MetadataError> {
        let mut identity = identities.new_identity()?;
        if let Some(study) = uid(meta, "study_instance_uid")? {
            identity.study = study;
        }
        if let Some(series) = uid(meta, "series_instance_uid")? {
            identity.series = series;
        }
        if let Some(sop) = uid(meta, "sop_instance_uid")? {
            identity.sop_instance = sop;
        }

        let mut record = ClinicalImageRecord::new(identity, captured_at);
        record.view_keyword = value(meta, "image_type").map(normalize_view_keyword);

        record.patient.name = person(meta, "patient");
        record.patient.id = owned(meta, "patient_id").unwrap_or_default();
        record.patient.sex = value(meta, "patient_sex")
            .map(|s| s.to_ascii_uppercase())
            .unwrap_or_default();
        record.patient.birth_date = value(meta, "patient_birthdate").and_then(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| warn!("Ignoring patient_birthdate '{}': {}", raw, e))
                .ok()
        });

        record.referring_provider = person(meta, "dental_provider");
        let operator = person(meta, "operator");
        record.operator = (!operator.is_empty()).then_some(operator);

        record.study_description = owned(meta, "study_description");
        record.series_description = owned(meta, "series_description");
        record.manufacturer = owned(meta, "manufacturer");
        record.institution_name = owned(meta, "institution_name");

        record.treatment_event_type = owned(meta, "treatment_event_type");
        record.days_after_event = value(meta, "days_after_event").and_then(|raw| {
            raw.parse::<u32>()
                .map_err(|e| warn!("Ignoring days_after_event '{}': {}", raw, e))
                .ok()
        });

        record.burned_in_annotation = value(meta, "burned_in_annotation").is_some_and(|v| {
            matches!(v.to_ascii_lowercase().as_str(), "yes" | "y" | "true" | "1")
        });

        Ok(record)
    }
}
