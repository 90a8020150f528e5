// mongovault/src/restore/logic.rs
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use super::restore_command::{build_restore_args, restore_log_path};
use crate::backup::archive::{ArchiveManager, validate_archive_path};
use crate::config::ExternalTool;
use crate::errors::{AppError, Result};
use crate::models::{RestoreRequest, RestoreResult, validate_parallel};
use crate::runner::run_command_streaming;
use crate::utils::{current_timestamp, redact_uri};

/// Unpacks an archive and drives the restore utility against it.
#[derive(Debug, Clone)]
pub struct RestoreOrchestrator {
    tool: ExternalTool,
    archives: ArchiveManager,
}

impl RestoreOrchestrator {
    pub fn new(tool: ExternalTool, archives: ArchiveManager) -> Self {
        Self { tool, archives }
    }

    pub async fn run(&self, request: RestoreRequest) -> RestoreResult {
        self.run_with_observer(request, None).await
    }

    /// Runs the restore, forwarding restore utility output lines to `observer`.
    ///
    /// Invalid requests return before anything is extracted or spawned. The
    /// extracted working directory is released whatever the outcome.
    pub async fn run_with_observer(
        &self,
        request: RestoreRequest,
        observer: Option<UnboundedSender<String>>,
    ) -> RestoreResult {
        if let Err(e) = validate_request(&request) {
            warn!(archive = %request.archive_path.display(), error = %e, "Rejected restore request");
            return RestoreResult::failed(&e);
        }

        info!(
            archive = %request.archive_path.display(),
            uri = %redact_uri(request.target.uri()),
            database = %request.target.database(),
            drop_existing = request.drop_existing,
            "Starting restore"
        );

        let archives = self.archives.clone();
        let archive_path = request.archive_path.clone();
        let unpacked = tokio::task::spawn_blocking(move || archives.unpack(&archive_path))
            .await
            .map_err(|e| AppError::Archive(format!("Extraction task failed: {}", e)))
            .and_then(|unpacked| unpacked);

        let handle = match unpacked {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed to unpack archive");
                return RestoreResult::failed(&e);
            }
        };

        let log_file = restore_log_path(&request.archive_path, &current_timestamp());
        let argv = build_restore_args(&self.tool, &request, handle.data_dir());
        let outcome = run_command_streaming(&argv, Some(&log_file), observer).await;
        ArchiveManager::release(handle);

        if outcome.success {
            info!(
                duplicates = outcome.diagnostics.duplicate_count,
                index_conflicts = outcome.diagnostics.index_conflicts,
                log_file = %log_file.display(),
                "Restore completed"
            );
        } else {
            warn!(exit_code = ?outcome.exit_code, "Restore utility failed");
        }

        let log_file = log_file.exists().then_some(log_file);
        RestoreResult::from_outcome(outcome, log_file)
    }
}

fn validate_request(request: &RestoreRequest) -> Result<()> {
    validate_archive_path(&request.archive_path)?;
    validate_parallel(request.parallel)?;
    request.filter.validate()
}
