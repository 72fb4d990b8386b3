// src/config.rs
use crate::error::SetupError;
use glob::glob;
use serde::Deserialize;
use std::{collections::HashSet, fs, path::Path, path::PathBuf, time::Duration};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Connection details and the list of files to import.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default, alias = "pw")]
    pub password: String,
    pub database: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub import: ImportSettings,
}

/// How timestamps in backup-table names are truncated.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupGranularity {
    #[default]
    Day,
    Minute,
}

impl BackupGranularity {
    pub fn format(self) -> &'static str {
        match self {
            BackupGranularity::Day => "%Y_%m_%d",
            BackupGranularity::Minute => "%Y_%m_%d_%H_%M",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub backup_granularity: BackupGranularity,
    pub max_workers: Option<usize>,
    pub worker_timeout_secs: u64,
    pub strict_headers: bool,
    pub fallback_encoding: String,
    pub max_connections: u32,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            backup_granularity: BackupGranularity::Day,
            max_workers: None,
            worker_timeout_secs: 600,
            strict_headers: false,
            fallback_encoding: "EUC-KR".to_string(),
            max_connections: 10,
        }
    }
}

impl ImportSettings {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    /// Worker-pool width; defaults to the connection limit.
    pub fn effective_workers(&self) -> usize {
        self.max_workers
            .unwrap_or(self.max_connections as usize)
            .max(1)
    }
}

fn default_port() -> u16 {
    3306
}

impl Config {
    /// Load from JSON when the path ends in `.json`, YAML otherwise.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let load_err = |reason: String| SetupError::ConfigLoad {
            path: path.display().to_string(),
            reason,
        };

        let contents = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let mut config: Config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&contents).map_err(|e| load_err(e.to_string()))?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| load_err(e.to_string()))?
        };

        if config.password.is_empty() {
            if let Ok(pw) = std::env::var("MYSQL_PWD") {
                config.password = pw;
            }
        }

        config.validate().map_err(load_err)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("`files` is empty".into());
        }
        if self.import.batch_size == 0 {
            return Err("`import.batch_size` must be at least 1".into());
        }
        if self.database.trim().is_empty() {
            return Err("`database` is empty".into());
        }
        Ok(())
    }

    /// Expand glob patterns in `files`. Entries without wildcards, or patterns
    /// matching nothing, are kept verbatim so the worker reports the failure.
    pub fn resolve_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.files.len());

        for entry in &self.files {
            let is_pattern = entry.contains(|c: char| matches!(c, '*' | '?' | '['));
            let mut matched = Vec::new();
            if is_pattern {
                match glob(entry) {
                    Ok(paths) => matched.extend(paths.filter_map(Result::ok)),
                    Err(e) => tracing::warn!(pattern = %entry, error = %e, "bad glob pattern"),
                }
            }
            if matched.is_empty() {
                matched.push(PathBuf::from(entry));
            }
            for p in matched {
                if seen.insert(p.clone()) {
                    out.push(p);
                }
            }
        }
        out
    }
}
