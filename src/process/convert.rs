use crate::error::ImportError;
use crate::process::classify::ColumnPlan;
use crate::process::date_parser::{self, DatetimeFormat};
use crate::process::raw_table::RawTable;
use crate::process::utils::{is_empty_token, quote_text};
use tracing::debug;

pub const NULL_LITERAL: &str = "NULL";

/// Rows whose cells are ready to be spliced into a `VALUES (...)` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedTable {
    pub rows: Vec<Vec<String>>,
    /// Layout adopted for datetime cells, if the file has any.
    pub datetime_format: Option<DatetimeFormat>,
}

/// Sample for format inference: the first data row's value in the first
/// datetime column. `None` when there is no such cell, or when it is an
/// empty cell of a nullable column.
fn datetime_sample<'a>(rows: &'a [Vec<String>], plan: &ColumnPlan) -> Option<&'a str> {
    let col = *plan.datetime.first()?;
    let cell = rows.first()?.get(col)?;
    if plan.is_nullable(col) && is_empty_token(cell) {
        None
    } else {
        Some(cell)
    }
}

/// Rewrite every cell into its SQL-literal form.
///
/// Rows stop at the first one whose first cell is empty. Per row, datetime
/// columns are normalised first, then empty nullable cells become `NULL`,
/// then character cells other than `NULL` are quoted. The input is never
/// modified.
pub fn transform(raw: &RawTable, plan: &ColumnPlan) -> Result<TypedTable, ImportError> {
    let rows = raw.effective_rows();

    let datetime_format = if plan.datetime.is_empty() {
        None
    } else {
        match datetime_sample(rows, plan) {
            Some(sample) => Some(DatetimeFormat::infer(sample).ok_or_else(|| {
                ImportError::NoTimeFormatMatch {
                    sample: sample.to_string(),
                }
            })?),
            None => None,
        }
    };
    if let Some(fmt) = datetime_format {
        debug!(format = fmt.pattern(), "adopted datetime format");
    }

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let mut cells = row.clone();

        for &col in &plan.datetime {
            let Some(original) = row.get(col) else { continue };
            if plan.is_nullable(col) && is_empty_token(original) {
                continue;
            }
            let time_err = |format: &'static str| ImportError::TimeParse {
                row: i + 1,
                column: plan.column_name(col),
                value: original.clone(),
                format,
            };
            let fmt = datetime_format.ok_or_else(|| time_err("<none>"))?;
            let parsed = fmt.parse(original).ok_or_else(|| time_err(fmt.pattern()))?;
            cells[col] = date_parser::to_sql_literal(&parsed);
        }

        for &col in &plan.nullable {
            if row.get(col).is_some_and(|c| is_empty_token(c)) {
                cells[col] = NULL_LITERAL.to_string();
            }
        }

        for &col in &plan.character {
            if let Some(cell) = cells.get_mut(col) {
                if cell.as_str() != NULL_LITERAL {
                    *cell = quote_text(cell);
                }
            }
        }

        out.push(cells);
    }

    Ok(TypedTable {
        rows: out,
        datetime_format,
    })
}
