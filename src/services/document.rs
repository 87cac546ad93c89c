//! Atomic document writes.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};

/// Replace the contents of `path` with `contents` in one rename.
///
/// The new contents are staged in a temp file next to the target (same
/// filesystem), flushed to disk, given the target's permissions and then
/// renamed over it. If anything fails before the rename the temp file is
/// removed and the original document is untouched.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> DomainResult<()> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &contents))
        .await
        .map_err(|e| DomainError::document_io(path, std::io::Error::other(e)))?
}

fn write_atomic_blocking(path: &Path, contents: &[u8]) -> DomainResult<()> {
    let io_err = |e: std::io::Error| DomainError::document_io(path, e);

    let dir: PathBuf = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let permissions = std::fs::metadata(path).map_err(io_err)?.permissions();

    let mut staged = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(&dir)
        .map_err(io_err)?;
    write_staged(&mut staged, contents).map_err(io_err)?;
    std::fs::set_permissions(staged.path(), permissions).map_err(io_err)?;

    let staged_path = staged.path().to_path_buf();
    staged.persist(path).map_err(|e| io_err(e.error))?;

    debug!(path = %path.display(), staged = %staged_path.display(), bytes = contents.len(), "document written");
    Ok(())
}

fn write_staged(staged: &mut NamedTempFile, contents: &[u8]) -> std::io::Result<()> {
    staged.write_all(contents)?;
    staged.flush()?;
    staged.as_file().sync_all()
}
