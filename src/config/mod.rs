// mongovault/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::AppError;
use crate::models::{BackupRequest, CollectionFilter, ConnectionTarget, RestoreRequest};

pub const DEFAULT_BACKUP_DIR: &str = "./backups";
pub const DEFAULT_KEEP_LAST: usize = 5;
pub const DEFAULT_PARALLEL: u32 = 1;
pub const DEFAULT_DUMP_PROGRAM: &str = "mongodump";
pub const DEFAULT_RESTORE_PROGRAM: &str = "mongorestore";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRestoreOptions {
    #[serde(default)]
    pub drop_existing: bool,
    pub parallel: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRetentionOptions {
    pub keep_last: Option<usize>,
    #[serde(default)]
    pub apply_after_backup: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub connection_uri: Option<String>,
    pub database: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub temp_root: Option<PathBuf>,
    pub parallel: Option<u32>,
    pub include_collections: Option<serde_json::Value>,
    pub exclude_collections: Option<serde_json::Value>,
    pub archive_file_path_for_restore: Option<String>,
    pub restore_options: Option<JsonRestoreOptions>,
    pub retention: Option<JsonRetentionOptions>,
    #[serde(default)]
    pub tools: ToolConfig,
}

/// An external utility, optionally launched through a wrapper
/// (e.g. `program = "docker"`, `leading_args = ["exec", "mongo", "mongodump"]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalTool {
    pub program: String,
    #[serde(default)]
    pub leading_args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Program followed by its leading arguments.
    pub fn command_prefix(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.leading_args.len());
        argv.push(self.program.clone());
        argv.extend(self.leading_args.iter().cloned());
        argv
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_dump_tool")]
    pub dump: ExternalTool,
    #[serde(default = "default_restore_tool")]
    pub restore: ExternalTool,
}

fn default_dump_tool() -> ExternalTool {
    ExternalTool::new(DEFAULT_DUMP_PROGRAM)
}

fn default_restore_tool() -> ExternalTool {
    ExternalTool::new(DEFAULT_RESTORE_PROGRAM)
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            dump: default_dump_tool(),
            restore: default_restore_tool(),
        }
    }
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub connection_uri: String,
    pub database: String,
    pub backup_dir: PathBuf,
    pub parallel: u32,
    pub include_collections: Vec<String>,
    pub exclude_collections: Vec<String>,
    /// `Some(keep_last)` when retention runs right after a successful backup.
    pub retention_after_backup: Option<usize>,
}

impl BackupConfig {
    pub fn to_request(&self) -> crate::errors::Result<BackupRequest> {
        Ok(BackupRequest {
            target: ConnectionTarget::new(&self.connection_uri, &self.database)?,
            destination_root: self.backup_dir.clone(),
            parallel: self.parallel,
            filter: CollectionFilter::new(&self.include_collections, &self.exclude_collections)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub connection_uri: String,
    pub database: String,
    pub archive_path: PathBuf,
    pub drop_existing: bool,
    pub parallel: u32,
    pub include_collections: Vec<String>,
    pub exclude_collections: Vec<String>,
}

impl RestoreConfig {
    pub fn to_request(&self) -> crate::errors::Result<RestoreRequest> {
        Ok(RestoreRequest {
            archive_path: self.archive_path.clone(),
            target: ConnectionTarget::new(&self.connection_uri, &self.database)?,
            drop_existing: self.drop_existing,
            parallel: self.parallel,
            filter: CollectionFilter::new(&self.include_collections, &self.exclude_collections)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub directory: PathBuf,
    pub keep_last: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub operation: Option<OperationConfig>,
    pub tools: ToolConfig,
    pub temp_root: Option<PathBuf>,
    pub raw_json_config: RawJsonConfig,
}

#[derive(Debug, Clone)]
pub enum OperationConfig {
    Backup(BackupConfig),
    Restore(RestoreConfig),
    Retention(RetentionConfig),
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        Self::from_json_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }

    pub fn from_json_str(content: &str) -> crate::errors::Result<Self> {
        let raw_json_config: RawJsonConfig = serde_json::from_str(content)?;
        Ok(Self::from_raw(raw_json_config))
    }

    pub fn from_raw(raw_json_config: RawJsonConfig) -> Self {
        AppConfig {
            operation: None, // To be filled by main after parsing CLI args
            tools: raw_json_config.tools.clone(),
            temp_root: raw_json_config.temp_root.clone(),
            raw_json_config,
        }
    }
}

fn required_string(value: &Option<String>, key: &str, operation: &str) -> crate::errors::Result<String> {
    let value = value
        .as_deref()
        .ok_or_else(|| AppError::Config(format!("{} must be set in config.json for {}", key, operation)))?
        .trim()
        .to_string();
    if value.is_empty() {
        return Err(AppError::Config(format!("{} cannot be empty in config.json.", key)));
    }
    Ok(value)
}

fn backup_dir(raw_config: &RawJsonConfig) -> crate::errors::Result<PathBuf> {
    let dir = raw_config
        .backup_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
    if dir.as_os_str().is_empty() {
        return Err(AppError::Config("backup_dir cannot be empty in config.json.".into()));
    }
    Ok(dir)
}

pub fn load_backup_config_from_json(raw_config: &RawJsonConfig) -> Result<BackupConfig> {
    let retention = raw_config.retention.clone().unwrap_or_default();
    Ok(BackupConfig {
        connection_uri: required_string(&raw_config.connection_uri, "connection_uri", "backup")?,
        database: required_string(&raw_config.database, "database", "backup")?,
        backup_dir: backup_dir(raw_config)?,
        parallel: raw_config.parallel.unwrap_or(DEFAULT_PARALLEL),
        include_collections: parse_collection_list(&raw_config.include_collections)
            .context("Invalid include_collections")?,
        exclude_collections: parse_collection_list(&raw_config.exclude_collections)
            .context("Invalid exclude_collections")?,
        retention_after_backup: retention
            .apply_after_backup
            .then(|| retention.keep_last.unwrap_or(DEFAULT_KEEP_LAST)),
    })
}

pub fn load_restore_config_from_json(raw_config: &RawJsonConfig) -> Result<RestoreConfig> {
    let archive_path =
        required_string(&raw_config.archive_file_path_for_restore, "archive_file_path_for_restore", "restore")?;
    let restore_opts = raw_config.restore_options.clone().unwrap_or_default();

    Ok(RestoreConfig {
        connection_uri: required_string(&raw_config.connection_uri, "connection_uri", "restore")?,
        database: required_string(&raw_config.database, "database", "restore")?,
        archive_path: PathBuf::from(archive_path),
        drop_existing: restore_opts.drop_existing,
        parallel: restore_opts
            .parallel
            .or(raw_config.parallel)
            .unwrap_or(DEFAULT_PARALLEL),
        include_collections: parse_collection_list(&raw_config.include_collections)
            .context("Invalid include_collections")?,
        exclude_collections: parse_collection_list(&raw_config.exclude_collections)
            .context("Invalid exclude_collections")?,
    })
}

pub fn load_retention_config_from_json(raw_config: &RawJsonConfig) -> Result<RetentionConfig> {
    Ok(RetentionConfig {
        directory: backup_dir(raw_config)?,
        keep_last: raw_config
            .retention
            .as_ref()
            .and_then(|r| r.keep_last)
            .unwrap_or(DEFAULT_KEEP_LAST),
    })
}

/// Parses a collection list given either as an array of names or as a
/// comma-separated string. Blank entries are dropped.
fn parse_collection_list(value: &Option<serde_json::Value>) -> crate::errors::Result<Vec<String>> {
    let names: Vec<String> = match value {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::String(text)) => text.split(',').map(str::to_string).collect(),
        Some(value) if value.is_array() => serde_json::from_value(value.clone())?,
        Some(_) => {
            return Err(AppError::Config(
                "collection list must be either an array of names or a comma-separated string".into(),
            ));
        }
    };

    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}
