use chrono::{DateTime, TimeZone};

use crate::config::BackupGranularity;
use crate::process::TypedTable;

/// Everything the importer executes for one file, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    pub table: String,
    pub backup_table: String,
    /// `RENAME TABLE` moving the live table to `backup_table`.
    pub backup: String,
    /// `DROP TABLE IF EXISTS` clearing `backup_table` before a retry.
    pub repair: String,
    /// `RENAME TABLE` moving `backup_table` back when the create fails.
    pub restore: String,
    /// Create-definition of the live table, re-run under the original name.
    pub create: String,
    pub inserts: Vec<String>,
    pub rows: usize,
}

/// `YYYY_MM_DD` or `YYYY_MM_DD_HH_MM`.
pub fn backup_suffix<Tz: TimeZone>(at: &DateTime<Tz>, granularity: BackupGranularity) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(granularity.format()).to_string()
}

pub fn backup_table_name(table: &str, suffix: &str) -> String {
    format!("{}_{}", table, suffix)
}

pub fn rename_statement(table: &str, backup_table: &str) -> String {
    format!("RENAME TABLE `{}` TO `{}`;", table, backup_table)
}

pub fn drop_statement(table: &str) -> String {
    format!("DROP TABLE IF EXISTS `{}`;", table)
}

/// One `INSERT` per `batch_size` rows; rows with an empty first cell are
/// skipped.
pub fn insert_statements(table: &str, rows: &[Vec<String>], batch_size: usize) -> Vec<String> {
    let live: Vec<&Vec<String>> = rows
        .iter()
        .filter(|r| r.first().is_some_and(|c| !c.is_empty()))
        .collect();

    live.chunks(batch_size.max(1))
        .map(|chunk| {
            let values: Vec<String> = chunk
                .iter()
                .map(|row| format!("({})", row.join(",")))
                .collect();
            format!("INSERT INTO `{}` VALUES {};", table, values.join(","))
        })
        .collect()
}

/// Assemble the statement set for `table`.
pub fn build_plan(
    table: &str,
    typed: &TypedTable,
    create_definition: String,
    suffix: &str,
    batch_size: usize,
) -> ImportPlan {
    let backup_table = backup_table_name(table, suffix);
    let inserts = insert_statements(table, &typed.rows, batch_size);
    let rows = typed
        .rows
        .iter()
        .filter(|r| r.first().is_some_and(|c| !c.is_empty()))
        .count();

    ImportPlan {
        table: table.to_string(),
        backup: rename_statement(table, &backup_table),
        repair: drop_statement(&backup_table),
        restore: rename_statement(&backup_table, table),
        backup_table,
        create: create_definition,
        inserts,
        rows,
    }
}
