//! Remote store capability trait.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::part::Part;
use crate::Result;

/// A backup source holding parts as individual objects.
///
/// Implementations enumerate, stream and delete part objects; they never
/// interpret the bytes. Errors are surfaced to the caller unretried, and
/// the restore pipeline treats any backend failure as fatal for the run.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Enumerate all parts under the configured root.
    ///
    /// Objects whose key does not parse as a part name are skipped with an
    /// informational notice. `actual_size` is populated from the backend's
    /// reported object size.
    async fn list_parts(&self) -> Result<Vec<Part>>;

    /// Stream the object holding `part` into `w`.
    ///
    /// Fails unless exactly `part.size` bytes are transferred.
    async fn download_part(
        &self,
        part: &Part,
        w: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()>;

    /// Delete the object holding `part`.
    async fn delete_part(&self, part: &Part) -> Result<()>;

    /// Human-readable identification for log messages.
    fn describe(&self) -> String;
}
