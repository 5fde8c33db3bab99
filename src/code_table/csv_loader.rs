use std::collections::HashMap;
use std::io::Read;

use super::{CodeEntry, CodeTableError, ViewDefinition};

const VIEWS: &str = "views";
const CODES: &str = "codes";

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn get_string(row: &csv::StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn csv_error(table: &'static str, e: csv::Error) -> CodeTableError {
    CodeTableError::Csv {
        table,
        message: e.to_string(),
    }
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input)
}

/// Parse the views table into `views`. A row keyed `VER:<version>` carries
/// the table version, which is returned.
pub fn load_views_csv<R: Read>(
    input: R,
    views: &mut HashMap<String, ViewDefinition>,
) -> Result<Option<String>, CodeTableError> {
    let mut reader = reader(input);
    let headers = reader.headers().map_err(|e| csv_error(VIEWS, e))?.clone();
    let idx_keyword = header_index(&headers, "keyword").ok_or(CodeTableError::MissingColumn {
        table: VIEWS,
        column: "keyword",
    })?;

    let mut version = None;
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(VIEWS, e))?;
        let keyword = get_string(&row, Some(idx_keyword));
        if keyword.is_empty() {
            continue;
        }
        if let Some(v) = keyword.strip_prefix("VER:") {
            version = Some(v.to_string());
            continue;
        }

        let mut view = ViewDefinition::new(keyword.clone());
        for (idx, name) in headers.iter().enumerate() {
            if idx == idx_keyword {
                continue;
            }
            view = view.with_column(name.trim(), get_string(&row, Some(idx)));
        }
        views.insert(keyword, view);
    }
    Ok(version)
}

/// Parse the codes table into `codes`. The `__version__` row carries the
/// table version in its `code` cell.
pub fn load_codes_csv<R: Read>(
    input: R,
    codes: &mut HashMap<String, CodeEntry>,
) -> Result<Option<String>, CodeTableError> {
    let mut reader = reader(input);
    let headers = reader.headers().map_err(|e| csv_error(CODES, e))?.clone();
    let column = |name: &'static str| {
        header_index(&headers, name).ok_or(CodeTableError::MissingColumn {
            table: CODES,
            column: name,
        })
    };
    let idx_keyword = column("keyword")?;
    let idx_code = column("code")?;
    let idx_codeset = column("codeset")?;
    let idx_meaning = column("meaning")?;

    let mut version = None;
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(CODES, e))?;
        let keyword = get_string(&row, Some(idx_keyword));
        if keyword.is_empty() {
            continue;
        }
        let code = get_string(&row, Some(idx_code));
        if keyword == "__version__" {
            version = Some(code);
            continue;
        }
        codes.insert(
            keyword,
            CodeEntry {
                code,
                codeset: get_string(&row, Some(idx_codeset)),
                meaning: get_string(&row, Some(idx_meaning)),
            },
        );
    }
    Ok(version)
}
