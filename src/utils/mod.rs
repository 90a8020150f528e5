use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use url::Url;
use which::which;

/// Format used for staged dump directories, archive names and log names.
/// Lexicographic order of formatted values matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn current_timestamp() -> String {
    format_timestamp(&Local::now())
}

/// Formats a line for the UI log sink: `[HH:MM:SS] message`.
pub fn format_log(message: &str) -> String {
    format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
}

/// Replaces the password of a connection string so it can be logged.
pub fn redact_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable uri>".to_string(),
    }
}

/// Finds an executable in the system PATH (or accepts an explicit path).
pub fn find_executable(program: &str) -> Result<PathBuf> {
    which(program).with_context(|| {
        format!(
            "{} executable not found in PATH. Please ensure the MongoDB database tools are installed and in your PATH.",
            program
        )
    })
}
