//! Remote store abstraction, backends, and the local destination store.
//!
//! Remote backends share one layout: every part is a single object whose
//! key encodes the part's identity. Supported backends:
//!
//! - **Filesystem**: backup tree on a locally mounted path (`fs://`)
//! - **S3**: AWS S3 and S3-compatible services (MinIO, Ceph RGW, etc.)
//! - **GCS**: Google Cloud Storage
//! - **Memory**: in-memory store (for testing)

mod config;
mod filesystem;
mod gcs;
mod local;
mod memory;
mod remote;
mod s3;

pub use config::RemoteConfig;
pub use filesystem::FilesystemRemote;
pub use gcs::{GcsConfig, GcsRemote};
pub use local::{LocalStore, PartReader, PartWriter};
pub use memory::MemoryRemote;
pub use remote::RemoteStore;
pub use s3::{S3Config, S3Remote};

use crate::Result;
use std::sync::Arc;

/// Create a remote store from its configuration.
pub fn create_remote(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>> {
    match config {
        RemoteConfig::Fs { path } => Ok(Arc::new(FilesystemRemote::new(path.clone()))),

        RemoteConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key,
            secret_key,
            prefix,
            allow_http,
        } => {
            let s3_config = S3Config {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key_id: access_key.clone(),
                secret_access_key: secret_key.clone(),
                prefix: prefix.clone(),
                allow_http: *allow_http,
            };
            Ok(Arc::new(S3Remote::new(s3_config)?))
        }

        RemoteConfig::Gcs {
            bucket,
            service_account_path,
            prefix,
        } => {
            let gcs_config = GcsConfig {
                bucket: bucket.clone(),
                service_account_path: service_account_path.clone(),
                prefix: prefix.clone(),
            };
            Ok(Arc::new(GcsRemote::new(gcs_config)?))
        }

        RemoteConfig::Memory => Ok(Arc::new(MemoryRemote::new())),
    }
}
