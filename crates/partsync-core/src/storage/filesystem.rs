//! Filesystem remote store implementation.
//!
//! Serves backups that live on a locally mounted path (`fs://`). The layout
//! is the same object-per-part scheme the object-store backends use: each
//! part is a single file whose path relative to the root is its remote key.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWrite;
use tracing::info;

use super::RemoteStore;
use crate::error::StorageError;
use crate::part::Part;
use crate::{Error, Result};

/// Remote store for a backup tree on the local filesystem.
#[derive(Debug, Clone)]
pub struct FilesystemRemote {
    root: PathBuf,
}

impl FilesystemRemote {
    /// Create a filesystem remote rooted at the given backup directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, part: &Part) -> PathBuf {
        self.root.join(part.remote_key())
    }

    /// Map an absolute file path back to its key relative to the root
    fn path_to_key(&self, path: &std::path::Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut key = String::new();
        for component in rel.components() {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(key)
    }
}

#[async_trait]
impl RemoteStore for FilesystemRemote {
    async fn list_parts(&self) -> Result<Vec<Part>> {
        if fs::metadata(&self.root).await.is_err() {
            return Err(Error::Storage(StorageError::Backend(format!(
                "backup root {:?} does not exist",
                self.root
            ))));
        }

        let mut parts = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                Error::Storage(StorageError::Backend(format!(
                    "failed to read directory {}: {}",
                    dir.display(),
                    e
                )))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                Error::Storage(StorageError::Backend(format!(
                    "failed to read directory entry: {}",
                    e
                )))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    Error::Storage(StorageError::Backend(format!(
                        "failed to stat {}: {}",
                        path.display(),
                        e
                    )))
                })?;
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let Some(key) = self.path_to_key(&path) else {
                    continue;
                };
                match Part::parse_remote_key(&key) {
                    Some(mut part) => {
                        let meta = entry.metadata().await.map_err(|e| {
                            Error::Storage(StorageError::Backend(format!(
                                "failed to stat {}: {}",
                                path.display(),
                                e
                            )))
                        })?;
                        part.actual_size = meta.len();
                        parts.push(part);
                    }
                    None => info!("skipping unknown object {:?} at {}", key, self.describe()),
                }
            }
        }
        Ok(parts)
    }

    async fn download_part(
        &self,
        part: &Part,
        w: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()> {
        let path = self.object_path(part);
        let mut file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Storage(StorageError::NotFound(path.display().to_string()))
            } else {
                Error::Storage(StorageError::Backend(format!(
                    "failed to open {}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        let bytes_read = tokio::io::copy(&mut file, w).await.map_err(|e| {
            Error::Download(format!(
                "cannot download {} from {}: {}",
                part,
                self.describe(),
                e
            ))
        })?;

        if bytes_read != part.size {
            return Err(Error::Download(format!(
                "wrong data size downloaded for {} from {}; got {} bytes; want {} bytes",
                part,
                self.describe(),
                bytes_read,
                part.size
            )));
        }
        Ok(())
    }

    async fn delete_part(&self, part: &Part) -> Result<()> {
        let path = self.object_path(part);
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Storage(StorageError::NotFound(path.display().to_string()))
            } else {
                Error::Storage(StorageError::Backend(format!(
                    "failed to delete {}: {}",
                    path.display(),
                    e
                )))
            }
        })?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("fs {:?}", self.root)
    }
}
