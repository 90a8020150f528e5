// mongovault/src/backup/archive.rs
use anyhow::Context;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tar::Builder;
use tempfile::{Builder as TempDirBuilder, TempDir};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::{AppError, Result};
use crate::models::ARCHIVE_EXTENSION;

/// A working directory owned by one orchestration.
///
/// The whole tree is removed when the handle is released or dropped, so every
/// exit path (including early returns and panics) cleans up.
#[derive(Debug)]
pub struct ArchiveHandle {
    root: TempDir,
    data_dir: PathBuf,
}

impl ArchiveHandle {
    /// Directory holding the dump data (staged output or extracted archive).
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Name of the data directory, used as the archive's top-level entry.
    pub fn name(&self) -> String {
        self.data_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Stages, packages and unpacks gzip-compressed tar archives.
#[derive(Debug, Clone, Default)]
pub struct ArchiveManager {
    temp_root: Option<PathBuf>,
}

impl ArchiveManager {
    /// `temp_root` is the parent of working directories; the system temp
    /// directory is used when it is `None`.
    pub fn new(temp_root: Option<PathBuf>) -> Self {
        Self { temp_root }
    }

    fn working_dir(&self, prefix: &str) -> Result<TempDir> {
        let mut builder = TempDirBuilder::new();
        builder.prefix(prefix);
        let dir = match &self.temp_root {
            Some(root) => {
                fs::create_dir_all(root).with_context(|| {
                    format!("Failed to create temporary root directory: {}", root.display())
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("Failed to create temporary working directory")?;
        Ok(dir)
    }

    /// Creates a fresh empty directory named `name` inside a unique working
    /// directory.
    pub fn stage(&self, name: &str) -> Result<ArchiveHandle> {
        let root = self.working_dir(&format!("mongovault_stage_{}_", name))?;
        let data_dir = root.path().join(name);
        fs::create_dir(&data_dir).with_context(|| {
            format!("Failed to create staging directory: {}", data_dir.display())
        })?;
        debug!(staging_dir = %data_dir.display(), "Staged working directory");
        Ok(ArchiveHandle { root, data_dir })
    }

    /// Compresses the staged directory into `<destination>.tar.gz`, rooted at
    /// the staged directory's name, then releases the handle.
    ///
    /// An existing file at the target path is never overwritten; packaging
    /// fails instead and the existing archive is left untouched.
    pub fn package(&self, handle: ArchiveHandle, destination: &Path) -> Result<PathBuf> {
        let mut archive_name = destination.as_os_str().to_owned();
        archive_name.push(ARCHIVE_EXTENSION);
        let archive_path = PathBuf::from(archive_name);

        let written = create_archive_file(&archive_path).and_then(|file| {
            let written = write_tar_gz(handle.data_dir(), &handle.name(), file);
            if written.is_err() {
                if let Err(e) = fs::remove_file(&archive_path) {
                    warn!(archive = %archive_path.display(), error = %e, "Failed to remove partial archive");
                }
            }
            written
        });
        Self::release(handle);
        written?;

        info!(archive = %archive_path.display(), "Archive created");
        Ok(archive_path)
    }

    /// Extracts `archive_path` into a fresh working directory and returns a
    /// handle whose data directory is the archive's single top-level directory.
    pub fn unpack(&self, archive_path: &Path) -> Result<ArchiveHandle> {
        validate_archive_path(archive_path)?;

        let root = self.working_dir("mongovault_restore_")?;
        info!(
            archive = %archive_path.display(),
            extract_to = %root.path().display(),
            "Extracting archive"
        );

        let archive_file = File::open(archive_path)
            .with_context(|| format!("Failed to open archive file: {}", archive_path.display()))?;
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(archive_file));
        archive.unpack(root.path()).map_err(|e| {
            AppError::Archive(format!("Failed to unpack {}: {}", archive_path.display(), e))
        })?;

        let data_dir = single_top_level_dir(root.path())?;
        debug!(data_dir = %data_dir.display(), "Located dump directory");
        Ok(ArchiveHandle { root, data_dir })
    }

    /// Removes the working directory tree. Failures are logged only.
    pub fn release(handle: ArchiveHandle) {
        let path = handle.root.path().to_path_buf();
        match handle.root.close() {
            Ok(()) => debug!(dir = %path.display(), "Released working directory"),
            Err(e) => warn!(dir = %path.display(), error = %e, "Failed to remove working directory"),
        }
    }
}

/// Checks that `path` is an existing file with the archive extension.
pub fn validate_archive_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(AppError::Validation("archive path is required".into()));
    }
    if !path.is_file() {
        return Err(AppError::NotFound(format!(
            "Backup file not found: {}",
            path.display()
        )));
    }
    if !path.to_string_lossy().ends_with(ARCHIVE_EXTENSION) {
        return Err(AppError::InvalidArchive(format!(
            "expected a {} file, got {}",
            ARCHIVE_EXTENSION,
            path.display()
        )));
    }
    Ok(())
}

fn create_archive_file(archive_path: &Path) -> Result<File> {
    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create parent directory for archive: {}", parent.display())
        })?;
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(archive_path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => AppError::Archive(format!(
                "Archive already exists, refusing to overwrite: {}",
                archive_path.display()
            )),
            _ => AppError::Archive(format!(
                "Failed to create archive file {}: {}",
                archive_path.display(),
                e
            )),
        })
}

fn write_tar_gz(source_dir: &Path, root_name: &str, archive_file: File) -> Result<()> {
    if !source_dir.is_dir() {
        return Err(AppError::Archive(format!(
            "Source for archival is not a directory: {}",
            source_dir.display()
        )));
    }

    let mut tar_builder = Builder::new(GzEncoder::new(archive_file, Compression::default()));

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("Failed to walk directory: {}", source_dir.display()))?;
        let path = entry.path();
        let relative = path.strip_prefix(source_dir).with_context(|| {
            format!("Failed to strip prefix {} from {}", source_dir.display(), path.display())
        })?;
        let name = Path::new(root_name).join(relative);

        if entry.file_type().is_dir() {
            tar_builder.append_dir(&name, path).with_context(|| {
                format!("Failed to append directory {} to archive", path.display())
            })?;
        } else if entry.file_type().is_file() {
            tar_builder.append_path_with_name(path, &name).with_context(|| {
                format!("Failed to append file {} as {} to archive", path.display(), name.display())
            })?;
        }
    }

    let encoder = tar_builder
        .into_inner()
        .context("Failed to finish tar stream")?;
    encoder
        .finish()
        .context("Failed to finish Gzip encoding for archive")?;
    Ok(())
}

fn single_top_level_dir(extract_dir: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(extract_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }

    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        0 => Err(AppError::InvalidArchive(
            "archive does not contain a top-level dump directory".into(),
        )),
        n => Err(AppError::InvalidArchive(format!(
            "archive contains {} top-level directories, expected exactly one",
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn write_tar_gz_entries(path: &Path, dirs: &[&str], files: &[(&str, &str)]) -> Result<()> {
        let file = File::create(path)?;
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        for dir in dirs {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder.append_data(&mut header, dir, std::io::empty())?;
        }
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_mode(0o644);
            header.set_size(body.len() as u64);
            builder.append_data(&mut header, name, body.as_bytes())?;
        }
        builder.into_inner()?.finish()?;
        Ok(())
    }

    #[test]
    fn stage_creates_empty_named_directory() -> Result<()> {
        let temp_root = TempDir::new()?;
        let manager = ArchiveManager::new(Some(temp_root.path().to_path_buf()));
        let handle = manager.stage("2024-10-01_10-00-00")?;

        assert!(handle.data_dir().is_dir());
        assert_eq!(handle.name(), "2024-10-01_10-00-00");
        assert_eq!(fs::read_dir(handle.data_dir())?.count(), 0);
        assert!(handle.data_dir().starts_with(temp_root.path()));
        Ok(())
    }

    #[test]
    fn package_then_unpack_keeps_single_root() -> Result<()> {
        let temp_root = TempDir::new()?;
        let out = TempDir::new()?;
        let manager = ArchiveManager::new(Some(temp_root.path().to_path_buf()));

        let handle = manager.stage("2024-10-01_10-00-00")?;
        let staged = handle.data_dir().to_path_buf();
        fs::create_dir_all(staged.join("shop"))?;
        fs::write(staged.join("shop/users.bson"), b"user-docs")?;
        fs::write(staged.join("shop/users.metadata.json"), b"{}")?;

        let archive = manager.package(handle, &out.path().join("shop_backup_2024-10-01_10-00-00"))?;
        assert_eq!(archive, out.path().join("shop_backup_2024-10-01_10-00-00.tar.gz"));
        assert!(fs::metadata(&archive)?.len() > 0);
        assert!(!staged.exists());

        let unpacked = manager.unpack(&archive)?;
        assert_eq!(unpacked.name(), "2024-10-01_10-00-00");
        assert_eq!(fs::read(unpacked.data_dir().join("shop/users.bson"))?, b"user-docs");

        let extracted = unpacked.data_dir().to_path_buf();
        ArchiveManager::release(unpacked);
        assert!(!extracted.exists());
        assert_eq!(fs::read_dir(temp_root.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn package_never_overwrites_an_existing_archive() -> Result<()> {
        let temp_root = TempDir::new()?;
        let out = TempDir::new()?;
        let manager = ArchiveManager::new(Some(temp_root.path().to_path_buf()));
        let destination = out.path().join("shop_backup_2024-10-01_10-00-00");

        let first = manager.stage("2024-10-01_10-00-00")?;
        fs::write(first.data_dir().join("users.bson"), b"first")?;
        let archive = manager.package(first, &destination)?;
        let original = fs::read(&archive)?;

        let second = manager.stage("2024-10-01_10-00-00")?;
        fs::write(second.data_dir().join("orders.bson"), b"second")?;
        let err = manager.package(second, &destination).unwrap_err();

        assert!(matches!(err, AppError::Archive(_)));
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read(&archive)?, original);
        assert_eq!(fs::read_dir(temp_root.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn dropping_a_handle_removes_the_tree() -> Result<()> {
        let temp_root = TempDir::new()?;
        let manager = ArchiveManager::new(Some(temp_root.path().to_path_buf()));
        let staged = {
            let handle = manager.stage("scoped")?;
            fs::write(handle.data_dir().join("partial.bson"), b"x")?;
            handle.data_dir().to_path_buf()
        };
        assert!(!staged.exists());
        Ok(())
    }

    #[test]
    fn unpack_validates_path() -> Result<()> {
        let dir = TempDir::new()?;
        let manager = ArchiveManager::new(Some(dir.path().join("tmp")));

        let missing = manager.unpack(&dir.path().join("missing.tar.gz")).unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));

        let zip = dir.path().join("backup.zip");
        fs::write(&zip, b"not a tarball")?;
        assert!(matches!(manager.unpack(&zip).unwrap_err(), AppError::InvalidArchive(_)));

        assert!(matches!(manager.unpack(Path::new("")).unwrap_err(), AppError::Validation(_)));
        Ok(())
    }

    #[test]
    fn unpack_rejects_unexpected_structure() -> Result<()> {
        let dir = TempDir::new()?;
        let manager = ArchiveManager::new(Some(dir.path().join("tmp")));

        let no_dirs = dir.path().join("flat.tar.gz");
        write_tar_gz_entries(&no_dirs, &[], &[("users.bson", "docs")])?;
        assert!(matches!(manager.unpack(&no_dirs).unwrap_err(), AppError::InvalidArchive(_)));

        let two_dirs = dir.path().join("two.tar.gz");
        write_tar_gz_entries(&two_dirs, &["a/", "b/"], &[])?;
        let err = manager.unpack(&two_dirs).unwrap_err();
        assert!(err.to_string().contains("2 top-level directories"));

        let with_stray_file = dir.path().join("stray.tar.gz");
        write_tar_gz_entries(&with_stray_file, &["2024-10-01_10-00-00/"], &[("README", "hi")])?;
        let handle = manager.unpack(&with_stray_file)?;
        assert_eq!(handle.name(), "2024-10-01_10-00-00");

        assert_eq!(fs::read_dir(dir.path().join("tmp"))?.count(), 1);
        drop(handle);
        assert_eq!(fs::read_dir(dir.path().join("tmp"))?.count(), 0);
        Ok(())
    }

    #[test]
    fn corrupt_archive_is_an_archive_error() -> Result<()> {
        let dir = TempDir::new()?;
        let manager = ArchiveManager::new(Some(dir.path().join("tmp")));
        let corrupt = dir.path().join("corrupt.tar.gz");
        fs::write(&corrupt, b"definitely not gzip")?;
        assert!(matches!(manager.unpack(&corrupt).unwrap_err(), AppError::Archive(_)));
        assert_eq!(fs::read_dir(dir.path().join("tmp"))?.count(), 0);
        Ok(())
    }
}
