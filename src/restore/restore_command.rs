// mongovault/src/restore/restore_command.rs
use std::path::{Path, PathBuf};

use crate::config::ExternalTool;
use crate::models::{ARCHIVE_EXTENSION, RestoreRequest};

/// Builds the restore utility argument vector, reading from `dump_dir`.
/// Namespace filters are qualified as `<db>.<collection>`.
pub fn build_restore_args(tool: &ExternalTool, request: &RestoreRequest, dump_dir: &Path) -> Vec<String> {
    let mut argv = tool.command_prefix();
    argv.extend([
        "--uri".to_string(),
        request.target.uri().to_string(),
        "--dir".to_string(),
        dump_dir.to_string_lossy().into_owned(),
        format!("--numParallelCollections={}", request.parallel),
    ]);

    if request.drop_existing {
        argv.push("--drop".to_string());
    }

    let db = request.target.database();
    let filter = &request.filter;
    if !filter.include().is_empty() {
        argv.extend(filter.include().iter().map(|c| format!("--nsInclude={}.{}", db, c)));
    } else {
        argv.extend(filter.exclude().iter().map(|c| format!("--nsExclude={}.{}", db, c)));
    }
    argv
}

/// `<archive-without-extension>_restore_<timestamp>.log`, next to the archive.
pub fn restore_log_path(archive_path: &Path, timestamp: &str) -> PathBuf {
    let archive = archive_path.to_string_lossy();
    let base = archive.strip_suffix(ARCHIVE_EXTENSION).unwrap_or(&*archive);
    PathBuf::from(format!("{}_restore_{}.log", base, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionFilter, ConnectionTarget};

    fn request(drop_existing: bool, filter: CollectionFilter) -> RestoreRequest {
        RestoreRequest {
            archive_path: PathBuf::from("/backups/shop_backup_2024-10-01_10-00-00.tar.gz"),
            target: ConnectionTarget::new("mongodb://localhost:27017", "shop").unwrap(),
            drop_existing,
            parallel: 2,
            filter,
        }
    }

    #[test]
    fn restore_args_minimal() {
        let argv = build_restore_args(
            &ExternalTool::new("mongorestore"),
            &request(false, CollectionFilter::all()),
            Path::new("/tmp/x/2024-10-01_10-00-00"),
        );
        assert_eq!(
            argv,
            vec![
                "mongorestore",
                "--uri",
                "mongodb://localhost:27017",
                "--dir",
                "/tmp/x/2024-10-01_10-00-00",
                "--numParallelCollections=2",
            ]
        );
    }

    #[test]
    fn restore_args_with_drop_and_namespace_include() {
        let argv = build_restore_args(
            &ExternalTool::new("mongorestore"),
            &request(true, CollectionFilter::include_only(["users"])),
            Path::new("/dump"),
        );
        assert_eq!(&argv[6..], ["--drop", "--nsInclude=shop.users"]);
    }

    #[test]
    fn restore_args_with_namespace_exclude() {
        let argv = build_restore_args(
            &ExternalTool::new("mongorestore"),
            &request(false, CollectionFilter::exclude_only(["sessions", "audit"])),
            Path::new("/dump"),
        );
        assert_eq!(&argv[6..], ["--nsExclude=shop.audit", "--nsExclude=shop.sessions"]);
        assert!(!argv.contains(&"--drop".to_string()));
    }

    #[test]
    fn log_path_sits_next_to_archive() {
        let log = restore_log_path(
            Path::new("/backups/shop_backup_2024-10-01_10-00-00.tar.gz"),
            "2024-10-02_08-30-00",
        );
        assert_eq!(
            log,
            PathBuf::from("/backups/shop_backup_2024-10-01_10-00-00_restore_2024-10-02_08-30-00.log")
        );
    }
}
