// mongovault/src/backup/logic.rs
use chrono::Local;
use std::fs;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use super::archive::ArchiveManager;
use super::dump_command::build_dump_args;
use crate::config::ExternalTool;
use crate::errors::{AppError, Result};
use crate::models::{BackupRequest, BackupResult, bytes_to_mb, validate_parallel};
use crate::runner::run_command_streaming;
use crate::utils::{format_timestamp, redact_uri};

/// Drives the dump utility and packages its output into a timestamped archive.
#[derive(Debug, Clone)]
pub struct BackupOrchestrator {
    tool: ExternalTool,
    archives: ArchiveManager,
}

impl BackupOrchestrator {
    pub fn new(tool: ExternalTool, archives: ArchiveManager) -> Self {
        Self { tool, archives }
    }

    pub async fn run(&self, request: BackupRequest) -> BackupResult {
        self.run_with_observer(request, None).await
    }

    /// Runs the backup, forwarding dump utility output lines to `observer`.
    ///
    /// The staging directory is released on every path. On success the
    /// archive `<db>_backup_<timestamp>.tar.gz` exists under the destination
    /// root; on failure no archive is left behind.
    pub async fn run_with_observer(
        &self,
        request: BackupRequest,
        observer: Option<UnboundedSender<String>>,
    ) -> BackupResult {
        let created_at = Local::now();
        let timestamp = format_timestamp(&created_at);

        if let Err(e) = validate_request(&request) {
            warn!(error = %e, "Rejected backup request");
            return BackupResult::failed(&e, created_at);
        }

        info!(
            uri = %redact_uri(request.target.uri()),
            database = %request.target.database(),
            parallel = request.parallel,
            "Starting backup"
        );

        let handle = match self.archives.stage(&timestamp) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed to stage backup directory");
                return BackupResult::failed(&e, created_at);
            }
        };

        let argv = build_dump_args(&self.tool, &request, handle.data_dir());
        let outcome = run_command_streaming(&argv, None, observer).await;

        if !outcome.success {
            warn!(exit_code = ?outcome.exit_code, "Dump utility failed, discarding staged output");
            ArchiveManager::release(handle);
            return BackupResult::from_outcome(outcome, created_at);
        }

        let mut result = BackupResult::from_outcome(outcome, created_at);
        let destination = request
            .destination_root
            .join(format!("{}_backup_{}", request.target.database(), timestamp));

        let archives = self.archives.clone();
        let packaged = tokio::task::spawn_blocking(move || archives.package(handle, &destination))
            .await
            .map_err(|e| AppError::Archive(format!("Archive task failed: {}", e)))
            .and_then(|packaged| packaged);

        let archive_path = match packaged {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "Failed to package backup");
                result.success = false;
                result.error = Some(e.to_string());
                return result;
            }
        };

        match fs::metadata(&archive_path) {
            Ok(metadata) => {
                let size_bytes = metadata.len();
                info!(
                    archive = %archive_path.display(),
                    size_bytes,
                    duplicates = result.diagnostics.duplicate_count,
                    "Backup completed"
                );
                result.size_bytes = Some(size_bytes);
                result.size_mb = Some(bytes_to_mb(size_bytes));
                result.archive_path = Some(archive_path);
            }
            Err(e) => {
                error!(archive = %archive_path.display(), error = %e, "Archive missing after packaging");
                result.success = false;
                result.error = Some(format!("Failed to read archive size: {}", e));
            }
        }
        result
    }
}

fn validate_request(request: &BackupRequest) -> Result<()> {
    if request.destination_root.as_os_str().is_empty() {
        return Err(AppError::Validation("destination directory is required".into()));
    }
    validate_parallel(request.parallel)?;
    request.filter.validate()
}
