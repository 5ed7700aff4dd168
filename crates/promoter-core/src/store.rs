//! Filesystem access to the pkgsinfo tree.
//!
//! Layout: `<munki root>/pkgsinfo/**/<pkginfo file>`. Dotfiles and symlinked
//! directories are skipped; every other file must be a parseable pkginfo.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{PromoterError, Result};
use crate::pkginfo::{content_digest, PackageRecord};
use crate::rings::Promotion;

/// Default Munki repository root.
pub const DEFAULT_MUNKI_ROOT: &str = "/Users/Shared/munki-repo";

/// Directory under the Munki root that holds pkginfo files.
pub const PKGSINFO_DIR_NAME: &str = "pkgsinfo";

/// A record paired with where it came from.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub path: PathBuf,
    pub record: PackageRecord,
    /// SHA-256 of the bytes as read.
    pub digest: String,
}

/// Resolve the pkgsinfo directory for a Munki root.
pub fn pkgsinfo_path(munki_root: &Path) -> PathBuf {
    munki_root.join(PKGSINFO_DIR_NAME)
}

/// Check that the pkgsinfo directory exists and is writable.
pub fn verify_store(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(PromoterError::StoreMissing(path.to_path_buf()));
    }
    tempfile::tempfile_in(path).map_err(|source| PromoterError::StoreNotWritable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Load a single pkginfo file.
pub fn load_record(path: &Path) -> Result<StoredRecord> {
    let bytes = fs::read(path).map_err(|source| PromoterError::RecordRead {
        path: path.to_path_buf(),
        source,
    })?;
    let identifier = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let record = PackageRecord::parse(&identifier, &bytes, path)?;
    Ok(StoredRecord {
        path: path.to_path_buf(),
        record,
        digest: content_digest(&bytes),
    })
}

/// Every non-hidden file under `root`, recursively, sorted per directory.
pub fn list_record_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(root, &mut files)?;
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&path, files)?;
        } else if file_type.is_symlink() && path.is_dir() {
            trace!(path = %path.display(), "skipping symlinked directory");
        } else if entry.file_name().to_string_lossy().starts_with('.') {
            trace!(path = %path.display(), "skipping hidden file");
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Records under `root` whose catalogs exactly match the promotion's source.
///
/// Any unreadable record aborts the scan.
pub fn find_candidates(root: &Path, promotion: Promotion) -> Result<Vec<StoredRecord>> {
    let mut candidates = Vec::new();
    for path in list_record_files(root)? {
        let stored = load_record(&path)?;
        if promotion.matches_source(&stored.record.rings) {
            debug!(path = %path.display(), promotion = %promotion, "candidate");
            candidates.push(stored);
        }
    }
    Ok(candidates)
}

/// Replace `path` with `bytes` via a sibling temp file and rename.
///
/// The original file's permissions are carried over to the new file.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| PromoterError::RecordWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
