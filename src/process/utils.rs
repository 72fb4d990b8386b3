use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::ImportError;

/// Identifiers we are willing to interpolate between backticks.
static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_$]{1,64}$").expect("static regex"));

/// The destination table is the file stem: `data/users.csv` → `users`.
pub fn table_name_from_path(path: &Path) -> Result<String, ImportError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.split('.').next().unwrap_or(s))
        .unwrap_or("")
        .to_string();

    if TABLE_NAME.is_match(&name) {
        Ok(name)
    } else {
        Err(ImportError::InvalidTableName {
            file: path.display().to_string(),
            name,
        })
    }
}

/// An empty cell, or the literal two-character `''`.
pub fn is_empty_token(cell: &str) -> bool {
    cell.is_empty() || cell == "''"
}

/// Wrap in single quotes after turning embedded `'` into `"`.
pub fn quote_text(cell: &str) -> String {
    format!("'{}'", cell.replace('\'', "\""))
}
