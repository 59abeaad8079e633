//! Remote store configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Remote store configuration using a tagged enum for type-safe configuration.
///
/// Supported backends:
/// - Filesystem: a backup tree on a locally mounted path
/// - S3 and S3-compatible services (MinIO, Ceph RGW, etc.)
/// - Google Cloud Storage
/// - In-memory (for testing)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend")]
pub enum RemoteConfig {
    /// Backup tree on the local filesystem
    #[serde(rename = "fs")]
    Fs {
        /// Absolute path of the backup root
        path: PathBuf,
    },

    /// AWS S3 or S3-compatible storage
    #[serde(rename = "s3")]
    S3 {
        /// S3 bucket name
        bucket: String,
        /// AWS region (e.g., "us-east-1")
        #[serde(default)]
        region: Option<String>,
        /// Custom endpoint URL (for S3-compatible services like MinIO)
        #[serde(default)]
        endpoint: Option<String>,
        /// Access key ID (falls back to AWS_ACCESS_KEY_ID env var)
        #[serde(default)]
        access_key: Option<String>,
        /// Secret access key (falls back to AWS_SECRET_ACCESS_KEY env var)
        #[serde(default)]
        secret_key: Option<String>,
        /// Key prefix of the backup root within the bucket
        #[serde(default)]
        prefix: Option<String>,
        /// Allow HTTP (insecure) connections
        #[serde(default)]
        allow_http: bool,
    },

    /// Google Cloud Storage
    #[serde(rename = "gcs")]
    Gcs {
        /// GCS bucket name
        bucket: String,
        /// Path to service account JSON key file (if None, uses Application Default Credentials)
        #[serde(default)]
        service_account_path: Option<String>,
        /// Key prefix of the backup root within the bucket
        #[serde(default)]
        prefix: Option<String>,
    },

    /// In-memory storage (for testing)
    #[serde(rename = "memory")]
    Memory,
}

impl RemoteConfig {
    /// Parse configuration from a `--src` URL.
    ///
    /// Supported URL formats:
    /// - `fs:///abs/path/to/backup`
    /// - `s3://bucket/prefix?region=us-east-1&endpoint=http://localhost:9000`
    /// - `gcs://bucket/prefix`
    /// - `memory://`
    pub fn from_url(src: &str) -> crate::Result<Self> {
        let parsed = url::Url::parse(src)
            .map_err(|e| crate::Error::Config(format!("Invalid source URL {:?}: {}", src, e)))?;

        match parsed.scheme() {
            "fs" => {
                let path = format!(
                    "{}{}",
                    parsed.host_str().unwrap_or_default(),
                    parsed.path()
                );
                if path.is_empty() {
                    return Err(crate::Error::Config(format!(
                        "source URL {:?} has an empty path",
                        src
                    )));
                }
                Ok(Self::Fs {
                    path: PathBuf::from(path),
                })
            }
            "s3" | "s3a" => {
                let bucket = parsed.host_str().unwrap_or_default().to_string();
                if bucket.is_empty() {
                    return Err(crate::Error::Config(format!(
                        "source URL {:?} has an empty bucket",
                        src
                    )));
                }
                let region = parsed
                    .query_pairs()
                    .find(|(k, _)| k == "region")
                    .map(|(_, v)| v.to_string());
                let endpoint = parsed
                    .query_pairs()
                    .find(|(k, _)| k == "endpoint")
                    .map(|(_, v)| v.to_string());
                let allow_http = parsed
                    .query_pairs()
                    .find(|(k, _)| k == "allow_http")
                    .map(|(_, v)| v == "true")
                    .unwrap_or(false);

                Ok(Self::S3 {
                    bucket,
                    region,
                    endpoint,
                    access_key: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                    secret_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                    prefix: url_prefix(&parsed),
                    allow_http,
                })
            }
            "gcs" | "gs" => {
                let bucket = parsed.host_str().unwrap_or_default().to_string();
                if bucket.is_empty() {
                    return Err(crate::Error::Config(format!(
                        "source URL {:?} has an empty bucket",
                        src
                    )));
                }
                Ok(Self::Gcs {
                    bucket,
                    service_account_path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
                    prefix: url_prefix(&parsed),
                })
            }
            "memory" => Ok(Self::Memory),
            scheme => Err(crate::Error::Config(format!(
                "Unknown source scheme: {}",
                scheme
            ))),
        }
    }
}

/// Bucket-relative prefix from the URL path, if any.
fn url_prefix(parsed: &url::Url) -> Option<String> {
    let prefix = parsed.path().trim_matches('/');
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_url_parsing() {
        let config = RemoteConfig::from_url("fs:///var/backups/daily").unwrap();
        match config {
            RemoteConfig::Fs { path } => {
                assert_eq!(path, PathBuf::from("/var/backups/daily"));
            }
            _ => panic!("Expected Fs config"),
        }
    }

    #[test]
    fn s3_url_parsing() {
        let config =
            RemoteConfig::from_url("s3://my-bucket/backups/daily?region=us-west-2").unwrap();
        match config {
            RemoteConfig::S3 {
                bucket,
                region,
                prefix,
                ..
            } => {
                assert_eq!(bucket, "my-bucket");
                assert_eq!(region, Some("us-west-2".to_string()));
                assert_eq!(prefix, Some("backups/daily".to_string()));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn s3_url_without_prefix() {
        let config = RemoteConfig::from_url("s3://my-bucket").unwrap();
        match config {
            RemoteConfig::S3 { bucket, prefix, .. } => {
                assert_eq!(bucket, "my-bucket");
                assert_eq!(prefix, None);
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn gcs_url_parsing() {
        let config = RemoteConfig::from_url("gcs://my-bucket/prod/backup").unwrap();
        match config {
            RemoteConfig::Gcs { bucket, prefix, .. } => {
                assert_eq!(bucket, "my-bucket");
                assert_eq!(prefix, Some("prod/backup".to_string()));
            }
            _ => panic!("Expected Gcs config"),
        }
    }

    #[test]
    fn memory_url_parsing() {
        let config = RemoteConfig::from_url("memory://").unwrap();
        assert!(matches!(config, RemoteConfig::Memory));
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = RemoteConfig::from_url("ftp://host/path").unwrap_err();
        assert!(err.to_string().contains("Unknown source scheme"));
    }

    #[test]
    fn garbage_url_is_rejected() {
        assert!(RemoteConfig::from_url("not a url").is_err());
    }
}
