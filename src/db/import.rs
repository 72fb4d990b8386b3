// src/db/import.rs
use std::{future::Future, pin::Pin};

use sqlx::{mysql::MySqlConnection, MySql};
use tracing::{debug, error, info, warn};

use super::statements::ImportPlan;
use super::MySqlDatabase;
use crate::error::ImportError;

type DbResult<T> = Result<T, sqlx::Error>;

/// A single open transaction.
pub trait SqlTransaction: Send {
    fn execute<'a>(&'a mut self, sql: &'a str)
        -> impl Future<Output = DbResult<u64>> + Send + 'a;
    fn commit(self) -> impl Future<Output = DbResult<()>> + Send;
    fn rollback(self) -> impl Future<Output = DbResult<()>> + Send;
}

/// Where a file's rows land. `execute` runs in autocommit mode and is used
/// for DDL, which MySQL never keeps inside a transaction; row data goes
/// through `begin`.
pub trait ImportTarget: Send + Sync {
    type Tx: SqlTransaction;
    fn execute<'a>(&'a self, sql: &'a str) -> impl Future<Output = DbResult<u64>> + Send + 'a;
    fn begin(&self) -> impl Future<Output = DbResult<Self::Tx>> + Send;
}

/// Transaction on a pooled MySQL connection. Dropping it rolls back.
pub struct MySqlTx {
    tx: sqlx::Transaction<'static, MySql>,
}

impl SqlTransaction for MySqlTx {
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
    ) -> impl Future<Output = DbResult<u64>> + Send + 'a {
        let conn: &'a mut MySqlConnection = &mut self.tx;
        let fut: Pin<Box<dyn Future<Output = DbResult<u64>> + Send + 'a>> =
            Box::pin(async move {
                sqlx::Executor::execute(conn, sqlx::raw_sql(sql))
                    .await
                    .map(|r| r.rows_affected())
            });
        fut
    }

    async fn commit(self) -> DbResult<()> {
        self.tx.commit().await
    }

    async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await
    }
}

impl ImportTarget for MySqlDatabase {
    type Tx = MySqlTx;

    async fn execute<'a>(&'a self, sql: &'a str) -> DbResult<u64> {
        sqlx::raw_sql(sql)
            .execute(self.pool())
            .await
            .map(|r| r.rows_affected())
    }

    async fn begin(&self) -> DbResult<MySqlTx> {
        Ok(MySqlTx {
            tx: self.pool().begin().await?,
        })
    }
}

/// Importer progress. `Committed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Start,
    BackupAttempted,
    CreateAttempted,
    Inserting,
    Committed,
    Failed,
}

/// Result of a committed import.
#[derive(Debug)]
pub struct ImportReport {
    pub state: ImportState,
    pub rows: usize,
    pub batches: usize,
    /// Set when the backup could not be taken; the import went ahead anyway.
    pub backup_error: Option<ImportError>,
}

struct Importer<'p, T> {
    target: &'p T,
    plan: &'p ImportPlan,
    state: ImportState,
}

impl<'p, T: ImportTarget> Importer<'p, T> {
    fn advance(&mut self, next: ImportState) {
        debug!(table = %self.plan.table, from = ?self.state, to = ?next, "import state");
        self.state = next;
    }

    async fn ddl(&self, sql: &str) -> DbResult<u64> {
        let result = self.target.execute(sql).await;
        if result.is_ok() {
            info!(table = %self.plan.table, statement = %sql, "executed");
        }
        result
    }

    /// Rename the live table out of the way; on failure drop whatever holds
    /// the backup name and retry once. Never fatal.
    async fn backup(&mut self) -> Option<ImportError> {
        let plan = self.plan;
        let first = self.ddl(&plan.backup).await;
        self.advance(ImportState::BackupAttempted);
        let first = match first {
            Ok(_) => return None,
            Err(e) => e,
        };

        warn!(table = %plan.table, statement = %plan.backup, error = %first, "backup failed, retrying");
        if let Err(e) = self.ddl(&plan.repair).await {
            warn!(table = %plan.table, statement = %plan.repair, error = %e, "repair failed");
        }
        match self.ddl(&plan.backup).await {
            Ok(_) => None,
            Err(source) => {
                let err = ImportError::BackupRename {
                    table: plan.table.clone(),
                    source,
                };
                warn!(table = %plan.table, error = %err, "continuing without backup");
                Some(err)
            }
        }
    }

    /// Move the backup back under the live name after a failed create.
    async fn restore(&self) {
        let plan = self.plan;
        if let Err(e) = self.ddl(&plan.restore).await {
            error!(
                table = %plan.table,
                backup = %plan.backup_table,
                error = %e,
                "restore failed, pre-run rows remain in the backup table"
            );
        }
    }

    /// All batches in one transaction; any failure rolls every batch back.
    async fn insert(&self) -> Result<(), ImportError> {
        let plan = self.plan;
        let tx_err = |source: sqlx::Error| ImportError::Transaction {
            table: plan.table.clone(),
            source,
        };

        let mut tx = self.target.begin().await.map_err(tx_err)?;
        for (batch, sql) in plan.inserts.iter().enumerate() {
            match tx.execute(sql).await {
                Ok(affected) => {
                    info!(table = %plan.table, batch, affected, "batch inserted");
                    debug!(table = %plan.table, batch, statement = %sql, "insert");
                }
                Err(source) => {
                    let err = ImportError::Insert {
                        table: plan.table.clone(),
                        batch,
                        source,
                    };
                    error!(table = %plan.table, error = %err, "insert failed, rolling back");
                    if let Err(e) = tx.rollback().await {
                        warn!(table = %plan.table, error = %e, "rollback failed");
                    }
                    return Err(err);
                }
            }
        }
        tx.commit().await.map_err(tx_err)
    }

    async fn run(mut self) -> Result<ImportReport, ImportError> {
        let plan = self.plan;
        let backup_error = self.backup().await;

        let created = self.ddl(&plan.create).await;
        self.advance(ImportState::CreateAttempted);
        if let Err(source) = created {
            let err = ImportError::CreateTable {
                table: plan.table.clone(),
                source,
            };
            error!(table = %plan.table, error = %err, "create failed");
            if backup_error.is_none() {
                self.restore().await;
            }
            self.advance(ImportState::Failed);
            return Err(err);
        }

        self.advance(ImportState::Inserting);
        if let Err(err) = self.insert().await {
            self.advance(ImportState::Failed);
            error!(table = %plan.table, error = %err, "import failed");
            return Err(err);
        }
        self.advance(ImportState::Committed);
        info!(table = %plan.table, rows = plan.rows, batches = plan.inserts.len(), "committed");

        Ok(ImportReport {
            state: self.state,
            rows: plan.rows,
            batches: plan.inserts.len(),
            backup_error,
        })
    }
}

/// Execute `plan`: backup and recreate in autocommit mode, then every insert
/// batch inside one transaction.
///
/// A failed backup is logged and tolerated. A failed create puts the backup
/// back. A failed batch rolls back every batch of the file.
pub async fn run_import<T: ImportTarget>(
    target: &T,
    plan: &ImportPlan,
) -> Result<ImportReport, ImportError> {
    Importer {
        target,
        plan,
        state: ImportState::Start,
    }
    .run()
    .await
}
