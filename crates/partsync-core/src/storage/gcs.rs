//! Google Cloud Storage remote store implementation.

use async_trait::async_trait;
use futures::StreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::RemoteStore;
use crate::error::StorageError;
use crate::part::Part;
use crate::{Error, Result};

/// Google Cloud Storage remote store configuration
#[derive(Debug, Clone, Default)]
pub struct GcsConfig {
    /// GCS bucket name
    pub bucket: String,
    /// Service account JSON key file; Application Default Credentials apply when unset
    pub service_account_path: Option<String>,
    /// Key prefix of the backup root within the bucket
    pub prefix: Option<String>,
}

/// Remote store for backups kept in Google Cloud Storage.
pub struct GcsRemote {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: Option<String>,
}

impl GcsRemote {
    /// Create a new Google Cloud Storage remote store. Authenticates with
    /// the configured service account file when one is given, and with
    /// Application Default Credentials otherwise.
    pub fn new(config: GcsConfig) -> Result<Self> {
        let GcsConfig {
            bucket,
            service_account_path,
            prefix,
        } = config;

        let builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&bucket);
        let builder = match service_account_path {
            Some(creds) => builder.with_service_account_path(creds),
            None => builder,
        };

        let store = builder.build().map_err(|e| {
            Error::Storage(StorageError::Backend(format!(
                "cannot create GCS client for bucket {:?}: {}",
                bucket, e
            )))
        })?;

        Ok(Self {
            store: Arc::new(store),
            bucket,
            prefix,
        })
    }

    fn full_path(&self, part: &Part) -> Path {
        match &self.prefix {
            Some(prefix) => Path::from(format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                part.remote_key()
            )),
            None => Path::from(part.remote_key()),
        }
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        match &self.prefix {
            Some(p) => key
                .strip_prefix(&format!("{}/", p.trim_end_matches('/')))
                .unwrap_or(key),
            None => key,
        }
    }
}

#[async_trait]
impl RemoteStore for GcsRemote {
    async fn list_parts(&self) -> Result<Vec<Part>> {
        let prefix_path = self.prefix.as_deref().map(Path::from);
        let mut stream = self.store.list(prefix_path.as_ref());

        let mut parts = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| {
                Error::Storage(StorageError::Backend(format!("GCS LIST failed: {}", e)))
            })?;
            let key = meta.location.as_ref();
            match Part::parse_remote_key(self.strip_prefix(key)) {
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
        let path = self.full_path(part);
        debug!("fetching gcs object {}", path);

        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::Storage(StorageError::NotFound(path.to_string()))
            }
            _ => Error::Storage(StorageError::Backend(format!("GCS GET failed: {}", e))),
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
        let path = self.full_path(part);
        debug!("removing gcs object {}", path);

        self.store.delete(&path).await.map_err(|e| {
            Error::Storage(StorageError::Backend(format!(
                "GCS DELETE failed for {}: {}",
                path, e
            )))
        })?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("GCS{{bucket: {:?}, prefix: {:?}}}", self.bucket, prefix),
            None => format!("GCS{{bucket: {:?}}}", self.bucket),
        }
    }
}
