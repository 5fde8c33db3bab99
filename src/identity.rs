//! Study, Series and SOP Instance UID management.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

/// Private root all generated identifiers live under
pub const DEFAULT_UID_ROOT: &str = "1.3.6.1.4.1.61741.11.2";

/// DICOM UI values are at most 64 characters
pub const UID_MAX_LEN: usize = 64;

const REPAIR_ATTEMPTS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid UID {value:?}: {reason}")]
    InvalidUid { value: String, reason: &'static str },

    #[error("UID root {0:?} leaves no room for a generated suffix")]
    RootTooLong(String),

    #[error("Identifiers still collide after {0} regeneration attempts")]
    Unrepairable(usize),
}

/// A validated DICOM UID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(String);

impl Uid {
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
        let value = value.into();
        let value = value.trim_end_matches(['\0', ' ']).to_string();
        validate(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Uid {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uid::new(s)
    }
}

fn validate(value: &str) -> Result<(), IdentityError> {
    let invalid = |reason| IdentityError::InvalidUid {
        value: value.to_string(),
        reason,
    };
    if value.is_empty() {
        return Err(invalid("empty"));
    }
    if value.len() > UID_MAX_LEN {
        return Err(invalid("longer than 64 characters"));
    }
    for component in value.split('.') {
        if component.is_empty() {
            return Err(invalid("empty component"));
        }
        if !component.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("non-numeric component"));
        }
        if component.len() > 1 && component.starts_with('0') {
            return Err(invalid("component with leading zero"));
        }
    }
    Ok(())
}

/// Generate a UID under `root`.
///
/// One dotted component is appended per byte of `seed` (or of a fresh random
/// v4 UUID), up to 16 minus the number of components already in the root,
/// and never past the 64 character ceiling. The same seed and root always
/// give the same UID.
pub fn generate(root: &str, seed: Option<&[u8; 16]>) -> Result<Uid, IdentityError> {
    let bytes = match seed {
        Some(seed) => *seed,
        None => *uuid::Uuid::new_v4().as_bytes(),
    };

    let mut uid = root.trim_end_matches('.').to_string();
    let count = bytes.len().saturating_sub(uid.split('.').count());
    for byte in bytes.iter().take(count) {
        let component = byte.to_string();
        if uid.len() + 1 + component.len() > UID_MAX_LEN {
            break;
        }
        uid.push('.');
        uid.push_str(&component);
    }

    if uid.len() == root.len() {
        return Err(IdentityError::RootTooLong(root.to_string()));
    }

    debug!("Generated new Instance UID {}", uid);
    Uid::new(uid)
}

/// The sub-roots carved out of one private root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidRoots {
    base: String,
}

impl Default for UidRoots {
    fn default() -> Self {
        Self::new(DEFAULT_UID_ROOT)
    }
}

impl UidRoots {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `<root>.0.<version>`, with anything but digits and dots removed from
    /// the version
    pub fn implementation_class(&self, version: &str) -> String {
        let version: String = version
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        format!("{}.0.{}", self.base, version)
    }

    pub fn media_storage(&self) -> String {
        format!("{}.1", self.base)
    }

    pub fn study(&self) -> String {
        format!("{}.2", self.base)
    }

    pub fn series(&self) -> String {
        format!("{}.3", self.base)
    }

    pub fn sop_instance(&self) -> String {
        format!("{}.4", self.base)
    }
}

/// The three identifiers of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIdentity {
    pub study: Uid,
    pub series: Uid,
    pub sop_instance: Uid,
}

/// Outcome of [`IdentityManager::ensure_distinct`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCheck {
    Distinct,
    /// Series and Study were regenerated; the old values are reported
    Repaired { old_series: Uid, old_study: Uid },
}

impl IdentityCheck {
    pub fn was_repaired(&self) -> bool {
        matches!(self, IdentityCheck::Repaired { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityManager {
    roots: UidRoots,
}

impl IdentityManager {
    pub fn new(roots: UidRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &UidRoots {
        &self.roots
    }

    pub fn study_uid(&self, seed: Option<&[u8; 16]>) -> Result<Uid, IdentityError> {
        generate(&self.roots.study(), seed)
    }

    pub fn series_uid(&self, seed: Option<&[u8; 16]>) -> Result<Uid, IdentityError> {
        generate(&self.roots.series(), seed)
    }

    pub fn sop_instance_uid(&self, seed: Option<&[u8; 16]>) -> Result<Uid, IdentityError> {
        generate(&self.roots.sop_instance(), seed)
    }

    /// Fresh random identifiers for a new record
    pub fn new_identity(&self) -> Result<RecordIdentity, IdentityError> {
        Ok(RecordIdentity {
            study: self.study_uid(None)?,
            series: self.series_uid(None)?,
            sop_instance: self.sop_instance_uid(None)?,
        })
    }

    /// Make the three identifiers pairwise distinct. On a collision Series and
    /// Study are regenerated; the SOP Instance UID is never touched.
    pub fn ensure_distinct(
        &self,
        identity: &mut RecordIdentity,
    ) -> Result<IdentityCheck, IdentityError> {
        if is_distinct(identity) {
            return Ok(IdentityCheck::Distinct);
        }

        warn!(
            "Identifier collision: study={} series={} sop={}; regenerating series and study",
            identity.study, identity.series, identity.sop_instance
        );
        let old_series = identity.series.clone();
        let old_study = identity.study.clone();

        for _ in 0..REPAIR_ATTEMPTS {
            identity.series = self.series_uid(None)?;
            identity.study = self.study_uid(None)?;
            if is_distinct(identity) {
                warn!(
                    "Identifiers repaired: study={} series={}",
                    identity.study, identity.series
                );
                return Ok(IdentityCheck::Repaired {
                    old_series,
                    old_study,
                });
            }
        }
        Err(IdentityError::Unrepairable(REPAIR_ATTEMPTS))
    }
}

fn is_distinct(identity: &RecordIdentity) -> bool {
    identity.study != identity.series
        && identity.study != identity.sop_instance
        && identity.series != identity.sop_instance
}
