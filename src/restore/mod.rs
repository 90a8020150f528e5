pub mod logic;
pub mod restore_command;

use anyhow::{Context, Result};

use crate::backup::archive::ArchiveManager;
use crate::config::{AppConfig, OperationConfig};
use crate::models::RestoreResult;
use crate::utils::format_log;
use crate::worker::{WorkerEvent, spawn_streaming};
use logic::RestoreOrchestrator;

/// Public entry point for the restore process.
/// Runs the restore on a worker, printing restore utility output as it arrives.
pub async fn run_restore_flow(app_config: &AppConfig) -> Result<RestoreResult> {
    let restore_config = match &app_config.operation {
        Some(OperationConfig::Restore(cfg)) => cfg,
        _ => anyhow::bail!("Restore operation selected but no restore configuration found."),
    };

    let request = restore_config
        .to_request()
        .context("Invalid restore configuration")?;
    let orchestrator = RestoreOrchestrator::new(
        app_config.tools.restore.clone(),
        ArchiveManager::new(app_config.temp_root.clone()),
    );

    println!("{}", format_log("Starting restore..."));
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
    finished.context("Restore worker stopped without a result")
}
