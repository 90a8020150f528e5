//! MongoDB Backup/Restore Tool
//!
//! Provides CLI interface for backup, restore and retention operations

use anyhow::{Context, Result};
use mongovault::config::{
    AppConfig, OperationConfig, load_backup_config_from_json, load_restore_config_from_json,
    load_retention_config_from_json,
};
use mongovault::{backup, restore, retention};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_ENV: &str = "MONGOVAULT_CONFIG";

/// Main entry point for the backup/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run_app().await {
        Ok(true) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("❌ Operation failed. See the result above for details.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected operation and prints its result as JSON.
/// Returns whether the operation succeeded.
async fn run_app() -> Result<bool> {
    let config_path = env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let mut app_config = AppConfig::load_from_json(&config_path)
        .context(format!("Failed to load application configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    match choice.as_str() {
        "1" | "backup" => {
            println!("🚀 Starting Backup Process...");
            let backup_config = load_backup_config_from_json(&app_config.raw_json_config)
                .context("Failed to load backup configuration from JSON")?;
            app_config.operation = Some(OperationConfig::Backup(backup_config));
            let result = backup::run_backup_flow(&app_config)
                .await
                .context("Backup process failed")?;
            if let (Some(path), Some(size_mb)) = (&result.archive_path, result.size_mb) {
                println!("📦 Backup created: {} ({} MB)", path.display(), size_mb);
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.success)
        }
        "2" | "restore" => {
            println!("🔄 Starting Restore Process...");
            let restore_config = load_restore_config_from_json(&app_config.raw_json_config)
                .context("Failed to load restore configuration from JSON")?;
            println!("Restore target database: {}, Archive: {}", restore_config.database, restore_config.archive_path.display());
            app_config.operation = Some(OperationConfig::Restore(restore_config));
            let result = restore::run_restore_flow(&app_config)
                .await
                .context("Restore process failed")?;
            if result.diagnostics.duplicate_count > 0 || result.diagnostics.index_conflicts > 0 {
                println!(
                    "⚠️ {} duplicate key errors, {} index conflicts",
                    result.diagnostics.duplicate_count, result.diagnostics.index_conflicts
                );
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.success)
        }
        "3" | "retention" => {
            println!("🧹 Applying Retention Policy...");
            let retention_config = load_retention_config_from_json(&app_config.raw_json_config)
                .context("Failed to load retention configuration from JSON")?;
            app_config.operation = Some(OperationConfig::Retention(retention_config));
            let summary = retention::run_retention_flow(&app_config)
                .context("Retention process failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(true)
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (backup), '2' (restore), or '3' (retention).");
            anyhow::bail!("Invalid operation choice");
        }
    }
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Restore Backup (or type 'restore')");
    println!("3. Apply Retention Policy (or type 'retention')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
