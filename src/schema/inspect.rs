// src/schema/inspect.rs
use std::future::Future;

use sqlx::{mysql::MySqlRow, Row};
use tracing::debug;

use super::ColumnSchema;
use crate::db::MySqlDatabase;
use crate::error::ImportError;

/// Read access to the live schema of destination tables.
pub trait SchemaInspector: Send + Sync {
    fn table_exists(&self, table: &str)
        -> impl Future<Output = Result<bool, ImportError>> + Send;

    /// Columns in ordinal order.
    fn columns(&self, table: &str)
        -> impl Future<Output = Result<Vec<ColumnSchema>, ImportError>> + Send;

    /// Engine-native `CREATE TABLE` text for `table`.
    fn create_definition(&self, table: &str)
        -> impl Future<Output = Result<String, ImportError>> + Send;
}

/// Existence check followed by the column query.
pub async fn inspect_table<S: SchemaInspector>(
    source: &S,
    table: &str,
) -> Result<Vec<ColumnSchema>, ImportError> {
    if !source.table_exists(table).await? {
        return Err(ImportError::TableNotFound {
            table: table.to_string(),
        });
    }
    let columns = source.columns(table).await?;
    debug!(table, columns = columns.len(), "inspected schema");
    Ok(columns)
}

fn schema_err(table: &str, source: sqlx::Error) -> ImportError {
    ImportError::SchemaQuery {
        table: table.to_string(),
        source,
    }
}

/// `SHOW` output may come back as binary strings depending on server version.
fn text_at(row: &MySqlRow, idx: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.unwrap_or_default();
    }
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .ok()
        .flatten()
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

impl SchemaInspector for MySqlDatabase {
    async fn table_exists(&self, table: &str) -> Result<bool, ImportError> {
        let sql = format!("SHOW TABLES LIKE '{}'", table);
        let rows = sqlx::raw_sql(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| schema_err(table, e))?;
        // LIKE treats `_` as a wildcard, so compare names exactly.
        Ok(rows.iter().any(|r| text_at(r, 0) == table))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, ImportError> {
        let sql = format!("SHOW FULL COLUMNS FROM `{}`", table);
        let rows = sqlx::raw_sql(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| schema_err(table, e))?;

        // Field, Type, Collation, Null, Key, Default, Extra, Privileges, Comment
        let columns: Vec<ColumnSchema> = rows
            .iter()
            .map(|r| {
                ColumnSchema::from_show_columns(
                    &text_at(r, 0),
                    &text_at(r, 1),
                    &text_at(r, 3),
                    &text_at(r, 4),
                )
            })
            .collect();

        if columns.is_empty() {
            return Err(schema_err(table, sqlx::Error::RowNotFound));
        }
        Ok(columns)
    }

    async fn create_definition(&self, table: &str) -> Result<String, ImportError> {
        let sql = format!("SHOW CREATE TABLE `{}`", table);
        let rows = sqlx::raw_sql(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| schema_err(table, e))?;
        let row = rows
            .first()
            .ok_or_else(|| schema_err(table, sqlx::Error::RowNotFound))?;
        let ddl = text_at(row, 1);
        if ddl.is_empty() {
            return Err(schema_err(table, sqlx::Error::RowNotFound));
        }
        Ok(ddl)
    }
}
