// src/process/mod.rs
pub mod classify;
pub mod convert;
pub mod date_parser;
pub mod encoding;
pub mod raw_table;
pub mod utils;

use csv::ReaderBuilder;
use std::{fs, path::Path};
use tracing::{debug, instrument};

use crate::error::ImportError;
pub use classify::{check_headers, ColumnPlan};
pub use convert::{transform, TypedTable};
pub use raw_table::RawTable;

/// Read `path` into a [`RawTable`]: UTF-8 check (with `fallback_encoding` for
/// legacy files), then CSV parsing with row 0 as the header.
///
/// Every record must have the header's field count.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_csv<P: AsRef<Path>>(path: P, fallback_encoding: &str) -> Result<RawTable, ImportError> {
    let path = path.as_ref();
    let file = path.display().to_string();

    let bytes = fs::read(path).map_err(|source| ImportError::FileRead {
        file: file.clone(),
        source,
    })?;
    let text = encoding::decode_to_utf8(&bytes, fallback_encoding).map_err(|reason| {
        ImportError::Encoding {
            file: file.clone(),
            reason,
        }
    })?;

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(text.as_bytes());

    let mut records = rdr.records();
    let headers: Vec<String> = match records.next() {
        Some(rec) => rec
            .map_err(|source| ImportError::CsvRead {
                file: file.clone(),
                source,
            })?
            .iter()
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for rec in records {
        let rec = rec.map_err(|source| ImportError::CsvRead {
            file: file.clone(),
            source,
        })?;
        rows.push(rec.iter().map(str::to_string).collect::<Vec<_>>());
    }

    debug!(columns = headers.len(), rows = rows.len(), "loaded csv");
    Ok(RawTable { headers, rows })
}
