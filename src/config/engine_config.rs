use std::path::PathBuf;

use part10::UncompressedSyntax;
use serde::Deserialize;

use super::ConfigError;
use crate::code_table::{CodeTable, CodeTableError};
use crate::identity::{generate, Uid, UidRoots, DEFAULT_UID_ROOT};
use crate::models::PRIVATE_VIEW_CID;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_uid_root")]
    pub uid_root: String,

    /// Context identifier marking the private view-type code
    #[serde(default = "default_private_view_cid")]
    pub private_view_cid: String,

    /// ContextGroupExtensionCreatorUID for private view codes
    pub creator_uid: Option<String>,

    /// Syntax for native pixel data: implicit-le, explicit-le or explicit-be
    #[serde(default = "default_transfer_syntax")]
    pub transfer_syntax: String,

    /// Re-encode JPEG input at this quality instead of passing it through
    pub jpeg_recompress_quality: Option<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            uid_root: default_uid_root(),
            private_view_cid: default_private_view_cid(),
            creator_uid: None,
            transfer_syntax: default_transfer_syntax(),
            jpeg_recompress_quality: None,
        }
    }
}

impl EngineConfig {
    pub fn syntax(&self) -> Result<UncompressedSyntax, ConfigError> {
        UncompressedSyntax::from_name(&self.transfer_syntax)
            .ok_or_else(|| ConfigError::UnknownTransferSyntax(self.transfer_syntax.clone()))
    }

    pub fn roots(&self) -> UidRoots {
        UidRoots::new(self.uid_root.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUidRoot {
            root: self.uid_root.clone(),
            reason,
        };
        Uid::new(self.uid_root.as_str()).map_err(|e| invalid(e.to_string()))?;
        // The deepest sub-root must still leave room for generated digits
        generate(&self.roots().sop_instance(), None).map_err(|e| invalid(e.to_string()))?;

        if let Some(uid) = &self.creator_uid {
            Uid::new(uid.as_str()).map_err(|e| invalid(e.to_string()))?;
        }
        self.syntax()?;
        if let Some(quality) = self.jpeg_recompress_quality {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::InvalidJpegQuality(quality));
            }
        }
        Ok(())
    }
}

/// Locations of the views and codes tables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeTablesConfig {
    pub views: Option<PathBuf>,
    pub codes: Option<PathBuf>,
}

impl CodeTablesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.views, &self.codes) {
            (Some(_), None) | (None, Some(_)) => Err(ConfigError::IncompleteCodeTables),
            _ => Ok(()),
        }
    }

    /// Load both tables, or an empty table when none are configured
    pub fn load(&self) -> Result<CodeTable, CodeTableError> {
        match (&self.views, &self.codes) {
            (Some(views), Some(codes)) => CodeTable::from_csv_files(views, codes),
            _ => {
                tracing::warn!("No code tables configured; records will not be coded");
                Ok(CodeTable::new())
            }
        }
    }
}

fn default_uid_root() -> String {
    DEFAULT_UID_ROOT.to_string()
}

fn default_private_view_cid() -> String {
    PRIVATE_VIEW_CID.to_string()
}

fn default_transfer_syntax() -> String {
    "explicit-le".to_string()
}
