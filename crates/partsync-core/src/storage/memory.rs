//! In-memory remote store for testing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use super::RemoteStore;
use crate::error::StorageError;
use crate::part::Part;
use crate::{Error, Result};

/// In-memory remote store backed by object_store's `InMemory`.
///
/// Doesn't persist anything between runs; useful for exercising the restore
/// pipeline in tests without a real backend.
pub struct MemoryRemote {
    store: Arc<InMemory>,
}

impl MemoryRemote {
    /// Create a new empty in-memory remote store
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
        }
    }

    /// Store `data` as the object for `part`, named by its remote key.
    pub async fn put_part(&self, part: &Part, data: Bytes) -> Result<()> {
        self.put_object(&part.remote_key(), data).await
    }

    /// Store `data` under a raw key. Lets tests plant objects that do not
    /// follow the part naming scheme.
    pub async fn put_object(&self, key: &str, data: Bytes) -> Result<()> {
        self.store
            .put(&Path::from(key), PutPayload::from_bytes(data))
            .await
            .map_err(|e| {
                Error::Storage(StorageError::Backend(format!("Memory PUT failed: {}", e)))
            })?;
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_parts(&self) -> Result<Vec<Part>> {
        let mut stream = self.store.list(None);

        let mut parts = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| {
                Error::Storage(StorageError::Backend(format!("Memory LIST failed: {}", e)))
            })?;
            let key = meta.location.as_ref();
            match Part::parse_remote_key(key) {
                Some(mut part) => {
                    part.actual_size = meta.size;
                    parts.push(part);
                }
                None => info!("skipping unknown object {:?} at {}", key, self.describe()),
            }
        }
        Ok(parts)
    }

    async fn download_part(
        &self,
        part: &Part,
        w: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()> {
        let path = Path::from(part.remote_key());
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::Storage(StorageError::NotFound(path.to_string()))
            }
            _ => Error::Storage(StorageError::Backend(format!("Memory GET failed: {}", e))),
        })?;

        let mut bytes_read = 0u64;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                Error::Download(format!("cannot download {} from {}: {}", part, self.describe(), e))
            })?;
            bytes_read += chunk.len() as u64;
            w.write_all(&chunk)
                .await
                .map_err(|e| Error::Write(format!("cannot write {}: {}", part, e)))?;
        }

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
        let path = Path::from(part.remote_key());
        self.store.delete(&path).await.map_err(|e| {
            Error::Storage(StorageError::Backend(format!(
                "Memory DELETE failed for {}: {}",
                path, e
            )))
        })?;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(path: &str, file_size: u64, offset: u64, size: u64) -> Part {
        Part {
            path: path.to_string(),
            file_size,
            offset,
            size,
            actual_size: size,
        }
    }

    #[tokio::test]
    async fn list_parses_part_keys_and_reports_sizes() {
        let remote = MemoryRemote::new();
        let p = part("a/b.bin", 4, 0, 4);
        remote.put_part(&p, Bytes::from_static(b"abcd")).await.unwrap();

        let listed = remote.list_parts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key(), p.key());
        assert_eq!(listed[0].actual_size, 4);
    }

    #[tokio::test]
    async fn list_skips_objects_with_unknown_names() {
        let remote = MemoryRemote::new();
        remote
            .put_object("notes.txt", Bytes::from_static(b"junk"))
            .await
            .unwrap();
        remote
            .put_part(&part("f", 1, 0, 1), Bytes::from_static(b"x"))
            .await
            .unwrap();

        let listed = remote.list_parts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "f");
    }

    #[tokio::test]
    async fn download_checks_transferred_byte_count() {
        let remote = MemoryRemote::new();
        // Declared size 4, stored object holds 3 bytes.
        let p = part("f", 4, 0, 4);
        remote.put_part(&p, Bytes::from_static(b"abc")).await.unwrap();

        let mut sink = Vec::new();
        let err = remote.download_part(&p, &mut sink).await.unwrap_err();
        assert!(err.to_string().contains("got 3 bytes; want 4 bytes"), "{}", err);
    }

    #[tokio::test]
    async fn download_streams_exact_bytes() {
        let remote = MemoryRemote::new();
        let p = part("f", 5, 0, 5);
        remote.put_part(&p, Bytes::from_static(b"hello")).await.unwrap();

        let mut sink = Vec::new();
        remote.download_part(&p, &mut sink).await.unwrap();
        assert_eq!(sink, b"hello");
    }

    #[tokio::test]
    async fn delete_removes_the_object() {
        let remote = MemoryRemote::new();
        let p = part("f", 1, 0, 1);
        remote.put_part(&p, Bytes::from_static(b"x")).await.unwrap();
        remote.delete_part(&p).await.unwrap();
        assert!(remote.list_parts().await.unwrap().is_empty());
    }
}
