use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use csvimporter::{
    config::Config,
    db::MySqlDatabase,
    orchestrator::{self, ImportContext, ImportStatus},
};
use std::{path::PathBuf, sync::Arc};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Load CSV files into existing MySQL tables")]
struct Args {
    /// JSON or YAML config file.
    #[arg(short, long, default_value = "conf.json")]
    config: PathBuf,
    /// Overrides `import.max_workers`.
    #[arg(long)]
    max_workers: Option<usize>,
    /// Overrides `import.worker_timeout_secs`.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Generate and log statements without executing them.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let args = Args::parse();
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(n) = args.max_workers {
        config.import.max_workers = Some(n);
    }
    if let Some(secs) = args.timeout_secs {
        config.import.worker_timeout_secs = secs;
    }

    let files = config.resolve_files();
    info!(files = files.len(), config = %args.config.display(), "config loaded");
    if files.is_empty() {
        warn!("nothing to import");
        return Ok(());
    }

    // ─── 3) connect ──────────────────────────────────────────────────
    let db = MySqlDatabase::connect(&config)
        .await
        .context("connecting to MySQL")?;

    // ─── 4) import every file ────────────────────────────────────────
    let start = Instant::now();
    let ctx = ImportContext::new(Arc::new(db), config.import.clone(), &Local::now())
        .with_dry_run(args.dry_run);
    let summary = orchestrator::run(ctx, files).await;

    for outcome in summary
        .outcomes
        .iter()
        .filter(|o| o.status == ImportStatus::Failure)
    {
        warn!(
            file = %outcome.file.display(),
            error = outcome.error.as_deref().unwrap_or(""),
            "not imported"
        );
    }
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        elapsed = ?start.elapsed(),
        "all done"
    );

    if summary.failed() > 0 {
        bail!("{} of {} files failed", summary.failed(), summary.outcomes.len());
    }
    Ok(())
}
