use crate::error::ImportError;
use crate::schema::ColumnSchema;

/// Which column indices need which rewrite. Built once per file from the live
/// schema; a column can sit in several lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPlan {
    pub names: Vec<String>,
    pub datetime: Vec<usize>,
    pub character: Vec<usize>,
    pub nullable: Vec<usize>,
}

impl ColumnPlan {
    pub fn from_schema(columns: &[ColumnSchema]) -> Self {
        let mut plan = ColumnPlan {
            names: Vec::with_capacity(columns.len()),
            ..Default::default()
        };
        for (i, col) in columns.iter().enumerate() {
            plan.names.push(col.name.clone());
            if col.is_datetime() {
                plan.datetime.push(i);
            }
            if col.is_character() {
                plan.character.push(i);
            }
            if col.nullable {
                plan.nullable.push(i);
            }
        }
        plan
    }

    pub fn is_nullable(&self, idx: usize) -> bool {
        self.nullable.binary_search(&idx).is_ok()
    }

    /// Cells of this column are emitted untouched (numbers and the like).
    pub fn is_passthrough(&self, idx: usize) -> bool {
        self.datetime.binary_search(&idx).is_err()
            && self.character.binary_search(&idx).is_err()
            && !self.is_nullable(idx)
    }

    pub fn column_name(&self, idx: usize) -> String {
        self.names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("#{}", idx))
    }
}

/// Compare CSV header names with schema names position by position
/// (trimmed, case-insensitive).
pub fn check_headers(headers: &[String], columns: &[ColumnSchema]) -> Result<(), ImportError> {
    let width = headers.len().max(columns.len());
    for index in 0..width {
        let csv = headers.get(index).map(|h| h.trim()).unwrap_or("");
        let table = columns.get(index).map(|c| c.name.as_str()).unwrap_or("");
        if !csv.eq_ignore_ascii_case(table) {
            return Err(ImportError::HeaderMismatch {
                index,
                csv: csv.to_string(),
                table: table.to_string(),
            });
        }
    }
    Ok(())
}
