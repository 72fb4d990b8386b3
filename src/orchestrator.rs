// src/orchestrator.rs
use chrono::{DateTime, TimeZone};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{mpsc, Semaphore},
    time::Instant,
};
use tracing::{error, info, instrument, warn};

use crate::config::ImportSettings;
use crate::db::import::{run_import, ImportTarget};
use crate::db::statements::{backup_suffix, build_plan};
use crate::error::ImportError;
use crate::process::{self, check_headers, transform, utils::table_name_from_path, ColumnPlan};
use crate::schema::{inspect_table, SchemaInspector};

/// Everything a worker needs, built once per run and shared read-only.
pub struct ImportContext<D> {
    pub db: Arc<D>,
    pub settings: Arc<ImportSettings>,
    /// Suffix for every backup table of this run.
    pub backup_suffix: String,
    pub worker_timeout: Duration,
    pub dry_run: bool,
}

impl<D> Clone for ImportContext<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            settings: Arc::clone(&self.settings),
            backup_suffix: self.backup_suffix.clone(),
            worker_timeout: self.worker_timeout,
            dry_run: self.dry_run,
        }
    }
}

impl<D> ImportContext<D> {
    pub fn new<Tz: TimeZone>(db: Arc<D>, settings: ImportSettings, started: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            db,
            backup_suffix: backup_suffix(started, settings.backup_granularity),
            worker_timeout: settings.worker_timeout(),
            settings: Arc::new(settings),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Success,
    Failure,
}

/// What happened to one input file. Exactly one per file.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub file: PathBuf,
    pub table: String,
    pub status: ImportStatus,
    pub error: Option<String>,
    /// A failed backup on an otherwise successful import.
    pub backup_warning: Option<String>,
    pub rows: usize,
    pub batches: usize,
    pub elapsed: Duration,
}

impl ImportOutcome {
    fn failure(file: PathBuf, table: String, err: &ImportError, elapsed: Duration) -> Self {
        Self {
            file,
            table,
            status: ImportStatus::Failure,
            error: Some(err.to_string()),
            backup_warning: None,
            rows: 0,
            batches: 0,
            elapsed,
        }
    }

    fn log(&self) {
        let file = self.file.display();
        match self.status {
            ImportStatus::Success => {
                info!(%file, table = %self.table, rows = self.rows, batches = self.batches,
                      elapsed = ?self.elapsed, "import complete");
                if let Some(w) = &self.backup_warning {
                    warn!(%file, table = %self.table, warning = %w, "imported without backup");
                }
            }
            ImportStatus::Failure => {
                error!(%file, table = %self.table, error = self.error.as_deref().unwrap_or(""),
                       elapsed = ?self.elapsed, "import failed");
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// In completion order.
    pub outcomes: Vec<ImportOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(ImportStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(ImportStatus::Failure)
    }

    fn count(&self, status: ImportStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn outcome_for(&self, table: &str) -> Option<&ImportOutcome> {
        self.outcomes.iter().find(|o| o.table == table)
    }
}

struct FileReport {
    rows: usize,
    batches: usize,
    backup_warning: Option<String>,
}

/// Run a closure on the blocking pool, turning a panic into an error.
async fn blocking<T, F>(f: F) -> Result<T, ImportError>
where
    F: FnOnce() -> Result<T, ImportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ImportError::WorkerPanicked(e.to_string()))?
}

#[instrument(level = "info", skip(ctx, file), fields(file = %file.display()))]
async fn import_file<D>(
    ctx: &ImportContext<D>,
    file: &Path,
    table: &str,
) -> Result<FileReport, ImportError>
where
    D: SchemaInspector + ImportTarget,
{
    let raw = {
        let path = file.to_path_buf();
        let settings = Arc::clone(&ctx.settings);
        blocking(move || process::load_csv(&path, &settings.fallback_encoding)).await?
    };

    let columns = inspect_table(&*ctx.db, table).await?;
    if ctx.settings.strict_headers {
        check_headers(&raw.headers, &columns)?;
    }
    let create = ctx.db.create_definition(table).await?;

    let plan = {
        let table = table.to_string();
        let suffix = ctx.backup_suffix.clone();
        let batch_size = ctx.settings.batch_size;
        blocking(move || {
            let columns = ColumnPlan::from_schema(&columns);
            let typed = transform(&raw, &columns)?;
            Ok(build_plan(&table, &typed, create, &suffix, batch_size))
        })
        .await?
    };
    info!(rows = plan.rows, batches = plan.inserts.len(), backup = %plan.backup_table, "statements ready");

    if ctx.dry_run {
        info!(statement = %plan.backup, "dry run");
        info!(statement = %plan.create, "dry run");
        for sql in &plan.inserts {
            info!(statement = %sql, "dry run");
        }
        return Ok(FileReport {
            rows: plan.rows,
            batches: plan.inserts.len(),
            backup_warning: None,
        });
    }

    let report = run_import(&*ctx.db, &plan).await?;
    Ok(FileReport {
        rows: report.rows,
        batches: report.batches,
        backup_warning: report.backup_error.map(|e| e.to_string()),
    })
}

/// One file, start to finish, always producing an outcome.
async fn worker<D>(ctx: &ImportContext<D>, file: PathBuf) -> ImportOutcome
where
    D: SchemaInspector + ImportTarget,
{
    let start = Instant::now();
    let table = match table_name_from_path(&file) {
        Ok(t) => t,
        Err(e) => {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return ImportOutcome::failure(file, stem, &e, start.elapsed());
        }
    };

    let result = match tokio::time::timeout(ctx.worker_timeout, import_file(ctx, &file, &table)).await
    {
        Ok(r) => r,
        Err(_) => Err(ImportError::Timeout(ctx.worker_timeout)),
    };

    match result {
        Ok(report) => ImportOutcome {
            file,
            table,
            status: ImportStatus::Success,
            error: None,
            backup_warning: report.backup_warning,
            rows: report.rows,
            batches: report.batches,
            elapsed: start.elapsed(),
        },
        Err(e) => ImportOutcome::failure(file, table, &e, start.elapsed()),
    }
}

async fn collect(mut rx: mpsc::Receiver<ImportOutcome>, expected: usize) -> Vec<ImportOutcome> {
    let mut outcomes = Vec::with_capacity(expected);
    while let Some(outcome) = rx.recv().await {
        outcome.log();
        outcomes.push(outcome);
    }
    outcomes
}

/// Import every file concurrently, at most `max_workers` at a time, and wait
/// for all workers and the outcome collector before returning.
pub async fn run<D>(ctx: ImportContext<D>, files: Vec<PathBuf>) -> RunSummary
where
    D: SchemaInspector + ImportTarget + 'static,
{
    let workers = ctx.settings.effective_workers();
    info!(files = files.len(), workers, backup_suffix = %ctx.backup_suffix, "starting import run");

    let (tx, rx) = mpsc::channel::<ImportOutcome>(files.len().max(1));
    let collector = tokio::spawn(collect(rx, files.len()));
    let sem = Arc::new(Semaphore::new(workers));

    let mut handles = Vec::with_capacity(files.len());
    for file in files {
        let ctx = ctx.clone();
        let tx = tx.clone();
        let sem = Arc::clone(&sem);
        let path = file.clone();
        handles.push((
            file,
            tokio::spawn(async move {
                let _permit = sem.acquire().await.ok();
                let outcome = worker(&ctx, path).await;
                let _ = tx.send(outcome).await;
            }),
        ));
    }

    for (file, handle) in handles {
        if let Err(e) = handle.await {
            // the worker died before reporting; report for it
            let table = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let err = ImportError::WorkerPanicked(e.to_string());
            let _ = tx
                .send(ImportOutcome::failure(file, table, &err, Duration::ZERO))
                .await;
        }
    }
    drop(tx);

    let outcomes = collector.await.unwrap_or_else(|e| {
        error!(error = %e, "outcome collector failed");
        Vec::new()
    });
    let summary = RunSummary { outcomes };
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "import run finished"
    );
    summary
}
