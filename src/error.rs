// src/error.rs
use std::time::Duration;
use thiserror::Error;

/// Errors scoped to a single input file. They end that file's import (except
/// `BackupRename`) but never stop sibling files.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid table name {name:?} derived from {file}")]
    InvalidTableName { file: String, name: String },

    #[error("failed to read {file}: {source}")]
    FileRead {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding: {file}: {reason}")]
    Encoding { file: String, reason: String },

    #[error("csv: {file}: {source}")]
    CsvRead {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("table `{table}` does not exist")]
    TableNotFound { table: String },

    #[error("schema query on `{table}` failed: {source}")]
    SchemaQuery {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("header mismatch at column {index}: csv has {csv:?}, table has {table:?}")]
    HeaderMismatch {
        index: usize,
        csv: String,
        table: String,
    },

    #[error("no datetime format matches sample {sample:?}")]
    NoTimeFormatMatch { sample: String },

    #[error("row {row}, column {column}: {value:?} does not match {format}")]
    TimeParse {
        row: usize,
        column: String,
        value: String,
        format: &'static str,
    },

    #[error("backup rename of `{table}` failed: {source}")]
    BackupRename {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("create table `{table}` failed: {source}")]
    CreateTable {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("insert into `{table}` failed at batch {batch}: {source}")]
    Insert {
        table: String,
        batch: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("transaction on `{table}` failed: {source}")]
    Transaction {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("worker timed out after {0:?}")]
    Timeout(Duration),

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

impl ImportError {
    /// Fatal errors abort the file; the only non-fatal one is a failed backup.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ImportError::BackupRename { .. })
    }
}

/// Errors that halt the whole run.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("config: {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    #[error("connection: {0}")]
    Connection(#[source] sqlx::Error),
}
