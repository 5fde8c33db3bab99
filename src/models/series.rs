use super::ClinicalImageRecord;
use crate::identity::{IdentityError, IdentityManager, Uid};

/// Photographs taken together: one Series UID and description for all
#[derive(Debug, Clone)]
pub struct PhotoSeries {
    series_uid: Uid,
    study_uid: Option<Uid>,
    description: Option<String>,
    records: Vec<ClinicalImageRecord>,
}

impl PhotoSeries {
    pub fn new(
        identities: &IdentityManager,
        description: Option<String>,
    ) -> Result<Self, IdentityError> {
        Ok(Self {
            series_uid: identities.series_uid(None)?,
            study_uid: None,
            description,
            records: Vec::new(),
        })
    }

    pub fn series_uid(&self) -> &Uid {
        &self.series_uid
    }

    pub fn records(&self) -> &[ClinicalImageRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ClinicalImageRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, mut record: ClinicalImageRecord) {
        self.apply(&mut record);
        self.records.push(record);
    }

    fn apply(&self, record: &mut ClinicalImageRecord) {
        record.identity.series = self.series_uid.clone();
        if let Some(study) = &self.study_uid {
            record.identity.study = study.clone();
        }
        if self.description.is_some() {
            record.series_description = self.description.clone();
        }
    }

    fn join_study(&mut self, study_uid: &Uid) {
        self.study_uid = Some(study_uid.clone());
        let records = std::mem::take(&mut self.records);
        for record in records {
            self.push(record);
        }
    }
}

/// Series of one visit sharing a Study UID
#[derive(Debug, Clone)]
pub struct PhotoStudy {
    study_uid: Uid,
    series: Vec<PhotoSeries>,
}

impl PhotoStudy {
    pub fn new(identities: &IdentityManager) -> Result<Self, IdentityError> {
        Ok(Self {
            study_uid: identities.study_uid(None)?,
            series: Vec::new(),
        })
    }

    pub fn study_uid(&self) -> &Uid {
        &self.study_uid
    }

    pub fn series(&self) -> &[PhotoSeries] {
        &self.series
    }

    /// Adopt a series; its records, present and future, take this Study UID
    pub fn add_series(&mut self, mut series: PhotoSeries) -> &mut PhotoSeries {
        series.join_study(&self.study_uid);
        self.series.push(series);
        let last = self.series.len() - 1;
        &mut self.series[last]
    }

    pub fn records(&self) -> impl Iterator<Item = &ClinicalImageRecord> {
        self.series.iter().flat_map(|s| s.records.iter())
    }
}
