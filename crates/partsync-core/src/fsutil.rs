//! Filesystem durability and robust-removal helpers.
//!
//! "On disk" here means: data written, file fsynced, containing directory
//! fsynced. Removal helpers retry the transient errors networked filesystems
//! produce when deleting directories that still hold server-side references.

use std::io;
use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::fs;
use tokio::time::Instant;
use tracing::warn;

use crate::{Error, Result};

/// Initial delay between removal retries.
const RETRY_START: Duration = Duration::from_millis(100);
/// Upper bound for a single retry delay.
const RETRY_CAP: Duration = Duration::from_secs(1);
/// Total time budget for retrying one removal before failing.
const RETRY_BUDGET: Duration = Duration::from_secs(60);

/// Fsync the file or directory at `path`.
pub async fn fsync_path(path: &Path) -> Result<()> {
    let f = fs::File::open(path)
        .await
        .map_err(|e| Error::Write(format!("cannot open {:?} for sync: {}", path, e)))?;
    f.sync_all()
        .await
        .map_err(|e| Error::Write(format!("cannot flush {:?} to storage: {}", path, e)))
}

/// Fsync the directory containing `path`, so a freshly created or removed
/// entry survives power loss.
pub async fn fsync_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => fsync_path(Path::new(".")).await,
        Some(parent) => fsync_path(parent).await,
        None => Ok(()),
    }
}

/// Recursively create `path` with mode `0700`.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder
        .create(path)
        .await
        .map_err(|e| Error::Write(format!("cannot create directory {:?}: {}", path, e)))
}

/// NFS-style errors seen while a remote server still references the entry.
fn is_transient_fs_error(err: &io::Error) -> bool {
    let msg = err.to_string();
    msg.contains("directory not empty") || msg.contains("device or resource busy")
}

/// Remove the file at `path`, retrying transient errors with exponential
/// backoff until [`RETRY_BUDGET`] is exhausted.
pub async fn remove_file_with_retry(path: &Path) -> Result<()> {
    remove_with_retry(path, false).await
}

/// Remove the empty directory at `path`, retrying transient errors.
pub async fn remove_dir_with_retry(path: &Path) -> Result<()> {
    remove_with_retry(path, true).await
}

async fn remove_with_retry(path: &Path, is_dir: bool) -> Result<()> {
    let start = Instant::now();
    let mut delay = RETRY_START;
    loop {
        let res = if is_dir {
            fs::remove_dir(path).await
        } else {
            fs::remove_file(path).await
        };
        let err = match res {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !is_transient_fs_error(&err) {
            return Err(Error::Delete(format!("cannot remove {:?}: {}", path, err)));
        }
        if start.elapsed() >= RETRY_BUDGET {
            return Err(Error::Delete(format!(
                "could not remove {:?} within {:?}: {}",
                path, RETRY_BUDGET, err
            )));
        }
        warn!(
            "transient error removing {:?}: {}; retrying in {:?}",
            path, err, delay
        );
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(RETRY_CAP);
    }
}

/// Recursively remove all directories under `root` that transitively contain
/// no files. `root` itself is preserved even when empty.
pub async fn remove_empty_dirs(root: &Path) -> Result<()> {
    if fs::metadata(root).await.is_err() {
        return Ok(());
    }
    prune_dir(root).await?;
    Ok(())
}

/// Prune empty subdirectories of `dir`; returns whether `dir` itself is now
/// empty. Parent directories are fsynced after any removal so the pruned
/// entries stay gone across power loss.
fn prune_dir(dir: &Path) -> BoxFuture<'_, Result<bool>> {
    Box::pin(async move {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| Error::Delete(format!("cannot read directory {:?}: {}", dir, e)))?;
        let mut subdirs = Vec::new();
        let mut kept = false;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            Error::Delete(format!("cannot read directory entry in {:?}: {}", dir, e))
        })? {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::Delete(format!("cannot stat {:?}: {}", entry.path(), e)))?;
            if file_type.is_dir() {
                subdirs.push(entry.path());
            } else {
                kept = true;
            }
        }
        let mut removed_any = false;
        for subdir in subdirs {
            if prune_dir(&subdir).await? {
                remove_dir_with_retry(&subdir).await?;
                removed_any = true;
            } else {
                kept = true;
            }
        }
        if removed_any {
            fsync_path(dir).await?;
        }
        Ok(!kept)
    })
}
