use crate::code_table::CodeEntry;

/// Longest value Code Value (SH) holds; longer values go to Long Code Value
pub const CODE_VALUE_MAX: usize = 16;

/// Code Meaning is LO
pub const CODE_MEANING_MAX: usize = 64;

/// Context group extension fields marking a private code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateExtension {
    pub context_identifier: String,
    pub extension_flag: bool,
    pub creator_uid: Option<String>,
    /// DT value, e.g. "20240131"
    pub local_version: Option<String>,
}

/// One coded concept. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeItem {
    value: String,
    scheme: String,
    meaning: String,
    private: Option<PrivateExtension>,
}

impl CodeItem {
    /// The meaning is cut to 64 characters; nothing is rejected
    pub fn new(
        value: impl Into<String>,
        scheme: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Self {
        let meaning: String = meaning.into();
        Self {
            value: value.into(),
            scheme: scheme.into(),
            meaning: meaning.chars().take(CODE_MEANING_MAX).collect(),
            private: None,
        }
    }

    pub fn from_entry(entry: &CodeEntry) -> Self {
        Self::new(&entry.code, &entry.codeset, &entry.meaning)
    }

    pub fn with_private(mut self, extension: PrivateExtension) -> Self {
        self.private = Some(extension);
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn meaning(&self) -> &str {
        &self.meaning
    }

    pub fn private(&self) -> Option<&PrivateExtension> {
        self.private.as_ref()
    }

    /// True for the item carrying `cid` with the extension flag set
    pub fn is_private_marker(&self, cid: &str) -> bool {
        self.private
            .as_ref()
            .is_some_and(|p| p.extension_flag && p.context_identifier == cid)
    }

    /// (CodeValue, CodingSchemeDesignator, CodeMeaning)
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.value, &self.scheme, &self.meaning)
    }
}
