pub mod archive;
pub mod dump_command;
pub mod logic;

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::{AppConfig, OperationConfig};
use crate::models::BackupResult;
use crate::retention::apply_retention_policy;
use crate::utils::format_log;
use crate::worker::{WorkerEvent, spawn_streaming};
use archive::ArchiveManager;
use logic::BackupOrchestrator;

/// Public entry point for the backup process.
/// Runs the backup on a worker, printing dump utility output as it arrives,
/// then applies the retention policy when configured to.
pub async fn run_backup_flow(app_config: &AppConfig) -> Result<BackupResult> {
    let backup_config = match &app_config.operation {
        Some(OperationConfig::Backup(cfg)) => cfg,
        _ => anyhow::bail!("Backup operation selected but no backup configuration found."),
    };

    let request = backup_config
        .to_request()
        .context("Invalid backup configuration")?;
    let orchestrator = BackupOrchestrator::new(
        app_config.tools.dump.clone(),
        ArchiveManager::new(app_config.temp_root.clone()),
    );

    println!("{}", format_log("Starting backup..."));
    if request.filter.is_empty() {
        println!("{}", format_log("Backing up all collections"));
    } else if !request.filter.include().is_empty() {
        let included: Vec<&str> = request.filter.include().iter().map(String::as_str).collect();
        println!("{}", format_log(&format!("Including collections: {}", included.join(", "))));
    } else {
        let excluded: Vec<&str> = request.filter.exclude().iter().map(String::as_str).collect();
        println!("{}", format_log(&format!("Excluding collections: {}", excluded.join(", "))));
    }

    let mut events = spawn_streaming(move |observer| async move {
        orchestrator.run_with_observer(request, Some(observer)).await
    });

    let mut finished = None;
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Line(line) => println!("{}", format_log(&line)),
            WorkerEvent::Finished(result) => finished = Some(result),
        }
    }
    let result = finished.context("Backup worker stopped without a result")?;

    if result.success {
        if let Some(keep_last) = backup_config.retention_after_backup {
            match apply_retention_policy(&backup_config.backup_dir, keep_last) {
                Ok(summary) => println!(
                    "{}",
                    format_log(&format!(
                        "Retention policy applied: kept {}, removed {}",
                        summary.kept.len(),
                        summary.removed.len()
                    ))
                ),
                Err(e) => warn!(error = %e, "Retention after backup failed"),
            }
        }
    }
    Ok(result)
}
