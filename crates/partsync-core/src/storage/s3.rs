//! S3-compatible remote store using object_store.

use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::RemoteStore;
use crate::error::StorageError;
use crate::part::Part;
use crate::{Error, Result};

/// S3 remote store configuration
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region
    pub region: Option<String>,
    /// Endpoint override for S3-compatible stores (MinIO, Ceph RGW)
    pub endpoint: Option<String>,
    /// Static access key id; the SDK credential chain applies when unset
    pub access_key_id: Option<String>,
    /// Static secret access key
    pub secret_access_key: Option<String>,
    /// Key prefix of the backup root within the bucket
    pub prefix: Option<String>,
    /// Allow plain-HTTP endpoints
    pub allow_http: bool,
}

/// Remote store for backups kept in S3 or an S3-compatible service.
pub struct S3Remote {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: Option<String>,
}

impl S3Remote {
    /// Create a new S3 remote store
    pub fn new(config: S3Config) -> Result<Self> {
        let S3Config {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            prefix,
            allow_http,
        } = config;

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&bucket)
            .with_allow_http(allow_http);
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = endpoint {
            // An endpoint override means an S3-compatible store; those
            // resolve buckets by path, not by hostname.
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
        }
        // A lone key id or lone secret is useless; apply them as a pair and
        // leave anything else to the SDK credential chain.
        if let (Some(id), Some(secret)) = (access_key_id, secret_access_key) {
            builder = builder.with_access_key_id(id).with_secret_access_key(secret);
        }

        let store = builder.build().map_err(|e| {
            Error::Storage(StorageError::Backend(format!(
                "cannot create S3 client for bucket {:?}: {}",
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

    /// Strip the prefix from a listed key to recover the part-relative key
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
impl RemoteStore for S3Remote {
    async fn list_parts(&self) -> Result<Vec<Part>> {
        let prefix_path = self.prefix.as_deref().map(Path::from);
        let mut stream = self.store.list(prefix_path.as_ref());

        let mut parts = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| {
                Error::Storage(StorageError::Backend(format!("S3 LIST failed: {}", e)))
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
        debug!("fetching s3 object {}", path);

        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::Storage(StorageError::NotFound(path.to_string()))
            }
            _ => Error::Storage(StorageError::Backend(format!("S3 GET failed: {}", e))),
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
        debug!("removing s3 object {}", path);

        self.store.delete(&path).await.map_err(|e| {
            Error::Storage(StorageError::Backend(format!(
                "S3 DELETE failed for {}: {}",
                path, e
            )))
        })?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("S3{{bucket: {:?}, prefix: {:?}}}", self.bucket, prefix),
            None => format!("S3{{bucket: {:?}}}", self.bucket),
        }
    }
}
