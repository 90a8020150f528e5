// mongovault/src/retention/mod.rs
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{AppConfig, OperationConfig};
use crate::errors::{AppError, Result};
use crate::models::ARCHIVE_EXTENSION;

/// Keep only the `keep_last` most recent archives in `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub directory: PathBuf,
    pub keep_last: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionSummary {
    pub kept: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl RetentionPolicy {
    pub fn new(directory: impl Into<PathBuf>, keep_last: usize) -> Self {
        Self {
            directory: directory.into(),
            keep_last,
        }
    }

    pub fn apply(&self) -> Result<RetentionSummary> {
        apply_retention_policy(&self.directory, self.keep_last)
    }
}

/// Deletes every `*.tar.gz` file in `directory` except the `keep_last`
/// newest, where newest means greatest file name. Archive names embed a
/// sortable timestamp, so name order is creation order. Other files and
/// subdirectories are never touched. Running it twice is a no-op.
pub fn apply_retention_policy(directory: &Path, keep_last: usize) -> Result<RetentionSummary> {
    if !directory.is_dir() {
        return Err(AppError::NotFound(format!(
            "Backup directory not found: {}",
            directory.display()
        )));
    }

    let mut archives = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(ARCHIVE_EXTENSION) {
            archives.push(name);
        }
    }
    archives.sort_unstable_by(|a, b| b.cmp(a));

    let mut summary = RetentionSummary::default();
    for (position, name) in archives.into_iter().enumerate() {
        let path = directory.join(&name);
        if position < keep_last {
            summary.kept.push(path);
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(archive = %path.display(), "Removed archive by retention policy");
                summary.removed.push(path);
            }
            // Concurrently removed; nothing left to do.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(archive = %path.display(), error = %e, "Failed to remove old archive");
                summary.kept.push(path);
            }
        }
    }
    Ok(summary)
}

/// Entry point for the `retention` CLI operation.
pub fn run_retention_flow(app_config: &AppConfig) -> anyhow::Result<RetentionSummary> {
    let retention_config = match &app_config.operation {
        Some(OperationConfig::Retention(cfg)) => cfg,
        _ => anyhow::bail!("Retention operation selected but no retention configuration found."),
    };

    let summary = RetentionPolicy::new(&retention_config.directory, retention_config.keep_last).apply()?;
    info!(
        directory = %retention_config.directory.display(),
        kept = summary.kept.len(),
        removed = summary.removed.len(),
        "Retention policy applied"
    );
    Ok(summary)
}
