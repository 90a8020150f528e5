// mongovault/src/backup/dump_command.rs
use std::path::Path;

use crate::config::ExternalTool;
use crate::models::BackupRequest;

/// Builds the dump utility argument vector for `request`, writing into `out_dir`.
///
/// Include and exclude flags are mutually exclusive; a validated request never
/// carries both, and include wins if one somehow does.
pub fn build_dump_args(tool: &ExternalTool, request: &BackupRequest, out_dir: &Path) -> Vec<String> {
    let mut argv = tool.command_prefix();
    argv.extend([
        "--uri".to_string(),
        request.target.uri().to_string(),
        "--db".to_string(),
        request.target.database().to_string(),
        "--out".to_string(),
        out_dir.to_string_lossy().into_owned(),
        format!("--numParallelCollections={}", request.parallel),
    ]);

    let filter = &request.filter;
    if !filter.include().is_empty() {
        argv.extend(filter.include().iter().map(|c| format!("--collection={}", c)));
    } else {
        argv.extend(filter.exclude().iter().map(|c| format!("--excludeCollection={}", c)));
    }
    argv
}
