//! Local destination store.
//!
//! The destination is an ordinary directory tree; the part view of it is
//! derived on every enumeration by slicing each regular file's length with
//! [`Part::slice_file`]. Nothing about parts is persisted locally, which is
//! what makes interrupted restores resumable: whatever made it to disk
//! (fsynced, at its declared offset) is re-discovered on the next run.

use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::fsutil;
use crate::part::Part;
use crate::{Error, Result};

/// Destination filesystem rooted at a data directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Create a local store rooted at `dir`. The directory may be absent; it
    /// is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of this store.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Human-readable identification for log messages.
    pub fn describe(&self) -> String {
        format!("local {:?}", self.dir)
    }

    fn abs_path(&self, path: &str) -> PathBuf {
        self.dir.join(path)
    }

    /// Enumerate the parts of every regular file under the root.
    ///
    /// An absent root yields an empty set: a fresh restore target is valid
    /// and the directory is created when the first part is written.
    pub async fn list_parts(&self) -> Result<Vec<Part>> {
        if fs::metadata(&self.dir).await.is_err() {
            return Ok(Vec::new());
        }

        let mut parts = Vec::new();
        let mut stack = vec![self.dir.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                Error::Storage(crate::error::StorageError::Backend(format!(
                    "failed to read directory {}: {}",
                    dir.display(),
                    e
                )))
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                Error::Storage(crate::error::StorageError::Backend(format!(
                    "failed to read directory entry: {}",
                    e
                )))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    Error::Storage(crate::error::StorageError::Backend(format!(
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
                let meta = entry.metadata().await.map_err(|e| {
                    Error::Storage(crate::error::StorageError::Backend(format!(
                        "failed to stat {}: {}",
                        path.display(),
                        e
                    )))
                })?;
                let Some(rel) = self.rel_path(&path) else {
                    continue;
                };
                parts.extend(Part::slice_file(&rel, meta.len()));
            }
        }
        parts.sort_unstable_by(|a, b| a.path.cmp(&b.path).then(a.offset.cmp(&b.offset)));
        Ok(parts)
    }

    fn rel_path(&self, path: &std::path::Path) -> Option<String> {
        let rel = path.strip_prefix(&self.dir).ok()?;
        let mut out = String::new();
        for component in rel.components() {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(out)
    }

    /// Open a writer positioned at `part.offset` within the destination
    /// file, creating parent directories (mode `0700`) and extending the
    /// file as needed.
    ///
    /// The writer must be finished with [`PartWriter::close`], which flushes
    /// and fsyncs the file and then fsyncs the containing directory.
    pub async fn part_writer(&self, part: &Part) -> Result<PartWriter> {
        let path = self.abs_path(&part.path);
        if let Some(parent) = path.parent() {
            fsutil::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| Error::Write(format!("cannot open writer for {:?}: {}", path, e)))?;
        file.seek(std::io::SeekFrom::Start(part.offset))
            .await
            .map_err(|e| {
                Error::Write(format!(
                    "cannot seek to offset {} in {:?}: {}",
                    part.offset, path, e
                ))
            })?;
        Ok(PartWriter { file, path })
    }

    /// Open a reader over exactly the byte range of `part`.
    pub async fn part_reader(&self, part: &Part) -> Result<PartReader> {
        let path = self.abs_path(&part.path);
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("cannot open {:?}: {}", path, e))))?;
        file.seek(std::io::SeekFrom::Start(part.offset))
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("cannot seek to offset {} in {:?}: {}", part.offset, path, e),
                ))
            })?;
        Ok(PartReader {
            inner: file.take(part.size),
        })
    }

    /// Delete the file at `path` relative to the root, returning its prior
    /// size. A missing file is not an error and reports size 0.
    pub async fn delete_path(&self, path: &str) -> Result<u64> {
        let full = self.abs_path(path);
        let meta = match fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(Error::Delete(format!("cannot stat {:?}: {}", full, e)));
            }
        };
        fsutil::remove_file_with_retry(&full).await?;
        Ok(meta.len())
    }

    /// Recursively remove directories that no longer contain any files.
    /// The root itself is preserved.
    pub async fn remove_empty_dirs(&self) -> Result<()> {
        fsutil::remove_empty_dirs(&self.dir).await
    }
}

/// Positioned writer for one part of a destination file.
pub struct PartWriter {
    file: fs::File,
    path: PathBuf,
}

impl PartWriter {
    /// Flush buffered data, fsync the file, then fsync the containing
    /// directory so the entry is durable across power loss.
    pub async fn close(mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| Error::Write(format!("cannot flush {:?}: {}", self.path, e)))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| Error::Write(format!("cannot sync {:?}: {}", self.path, e)))?;
        fsutil::fsync_parent_dir(&self.path).await
    }
}

impl AsyncWrite for PartWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

/// Size-limited positioned reader over one part of a local file.
pub struct PartReader {
    inner: tokio::io::Take<fs::File>,
}

impl AsyncRead for PartReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
