// mongovault/src/models.rs
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::errors::{AppError, Result};

pub const MIN_PARALLEL: u32 = 1;
pub const MAX_PARALLEL: u32 = 16;
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Connection string plus the database the utilities operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTarget {
    #[serde(skip_serializing)]
    uri: String,
    database: String,
}

impl ConnectionTarget {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Result<Self> {
        let uri = uri.into().trim().to_string();
        let database = database.into().trim().to_string();
        if uri.is_empty() {
            return Err(AppError::Validation("connection string is required".into()));
        }
        if database.is_empty() {
            return Err(AppError::Validation("database name is required".into()));
        }
        Ok(Self { uri, database })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Include set XOR exclude set of collection names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl CollectionFilter {
    /// Blank names are dropped. Supplying both sets is rejected.
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let filter = Self {
            include: clean_names(include),
            exclude: clean_names(exclude),
        };
        filter.validate()?;
        Ok(filter)
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn include_only<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            include: clean_names(names),
            exclude: BTreeSet::new(),
        }
    }

    pub fn exclude_only<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            include: BTreeSet::new(),
            exclude: clean_names(names),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.include.is_empty() && !self.exclude.is_empty() {
            return Err(AppError::Validation(
                "collection filter cannot both include and exclude collections".into(),
            ));
        }
        Ok(())
    }

    pub fn include(&self) -> &BTreeSet<String> {
        &self.include
    }

    pub fn exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn clean_names<I>(names: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn validate_parallel(parallel: u32) -> Result<()> {
    if !(MIN_PARALLEL..=MAX_PARALLEL).contains(&parallel) {
        return Err(AppError::Validation(format!(
            "parallelism must be between {} and {}, got {}",
            MIN_PARALLEL, MAX_PARALLEL, parallel
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupRequest {
    pub target: ConnectionTarget,
    pub destination_root: PathBuf,
    pub parallel: u32,
    pub filter: CollectionFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreRequest {
    pub archive_path: PathBuf,
    pub target: ConnectionTarget,
    pub drop_existing: bool,
    pub parallel: u32,
    pub filter: CollectionFilter,
}

/// Advisory conditions found in utility output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub duplicate_count: usize,
    pub duplicate_per_collection: BTreeMap<String, usize>,
    pub index_conflicts: usize,
}

/// Outcome of a single external process invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
    pub archive_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
    pub size_mb: Option<f64>,
    pub created_at: DateTime<Local>,
    pub error: Option<String>,
}

impl BackupResult {
    pub(crate) fn from_outcome(outcome: CommandOutcome, created_at: DateTime<Local>) -> Self {
        Self {
            success: outcome.success,
            exit_code: outcome.exit_code,
            output: outcome.output,
            diagnostics: outcome.diagnostics,
            archive_path: None,
            size_bytes: None,
            size_mb: None,
            created_at,
            error: outcome.error,
        }
    }

    pub(crate) fn failed(error: &AppError, created_at: DateTime<Local>) -> Self {
        Self::from_outcome(CommandOutcome::failed(error.to_string()), created_at)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
    pub log_file: Option<PathBuf>,
    pub error: Option<String>,
}

impl RestoreResult {
    pub(crate) fn from_outcome(outcome: CommandOutcome, log_file: Option<PathBuf>) -> Self {
        Self {
            success: outcome.success,
            exit_code: outcome.exit_code,
            output: outcome.output,
            diagnostics: outcome.diagnostics,
            log_file,
            error: outcome.error,
        }
    }

    pub(crate) fn failed(error: &AppError) -> Self {
        Self::from_outcome(CommandOutcome::failed(error.to_string()), None)
    }
}

/// Bytes to MiB, rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
