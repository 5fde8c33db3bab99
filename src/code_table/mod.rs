//! Clinical vocabulary: the views table and the codes table.
//!
//! A [`CodeTable`] is built once, then shared by reference with every
//! record that needs coding. Nothing here is global.

mod csv_loader;

use std::collections::HashMap;

use thiserror::Error;

pub use csv_loader::{load_codes_csv, load_views_csv};

#[derive(Debug, Error)]
pub enum CodeTableError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {table} table: {message}")]
    Csv { table: &'static str, message: String },

    #[error("{table} table has no '{column}' column")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// One row of the views table: column name to raw cell value, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewDefinition {
    keyword: String,
    columns: Vec<(String, String)>,
}

impl ViewDefinition {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Raw cell value; missing columns read as absent
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Cell value split on "^", dropping empty and "na" tokens
    pub fn tokens(&self, column: &str) -> Vec<&str> {
        split_tokens(self.get(column).unwrap_or_default())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Split a "^"-delimited cell, skipping blanks and the "na" placeholder
pub fn split_tokens(cell: &str) -> Vec<&str> {
    cell.split('^')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "na")
        .collect()
}

/// One row of the codes table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: String,
    pub codeset: String,
    pub meaning: String,
}

impl CodeEntry {
    pub fn new(
        code: impl Into<String>,
        codeset: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            codeset: codeset.into(),
            meaning: meaning.into(),
        }
    }
}

/// Read access to the vocabulary. Implemented by [`CodeTable`]; callers
/// with their own storage can implement it directly.
pub trait CodeSource {
    fn get_view(&self, keyword: &str) -> Option<&ViewDefinition>;
    fn get_code(&self, keyword: &str) -> Option<&CodeEntry>;
}

#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    views: HashMap<String, ViewDefinition>,
    codes: HashMap<String, CodeEntry>,
    views_version: Option<String>,
    codes_version: Option<String>,
}

impl CodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load both tables from CSV files on disk
    pub fn from_csv_files(
        views_path: &std::path::Path,
        codes_path: &std::path::Path,
    ) -> Result<Self, CodeTableError> {
        let read = |path: &std::path::Path| {
            std::fs::read(path).map_err(|source| CodeTableError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        let views = read(views_path)?;
        let codes = read(codes_path)?;
        Self::from_csv_readers(views.as_slice(), codes.as_slice())
    }

    pub fn from_csv_readers<V: std::io::Read, C: std::io::Read>(
        views: V,
        codes: C,
    ) -> Result<Self, CodeTableError> {
        let mut table = Self::new();
        table.views_version = load_views_csv(views, &mut table.views)?;
        table.codes_version = load_codes_csv(codes, &mut table.codes)?;
        tracing::info!(
            "Loaded code table: {} views (version {}), {} codes (version {})",
            table.views.len(),
            table.views_version.as_deref().unwrap_or("unknown"),
            table.codes.len(),
            table.codes_version.as_deref().unwrap_or("unknown"),
        );
        Ok(table)
    }

    pub fn insert_view(&mut self, view: ViewDefinition) {
        self.views.insert(view.keyword.clone(), view);
    }

    pub fn insert_code(&mut self, keyword: impl Into<String>, entry: CodeEntry) {
        self.codes.insert(keyword.into(), entry);
    }

    pub fn views_version(&self) -> Option<&str> {
        self.views_version.as_deref()
    }

    pub fn codes_version(&self) -> Option<&str> {
        self.codes_version.as_deref()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }
}

impl CodeSource for CodeTable {
    fn get_view(&self, keyword: &str) -> Option<&ViewDefinition> {
        self.views.get(keyword)
    }

    fn get_code(&self, keyword: &str) -> Option<&CodeEntry> {
        self.codes.get(keyword)
    }
}
