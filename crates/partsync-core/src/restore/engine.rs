//! Restore engine orchestration.
//!
//! The pipeline: enumerate both sides, validate the source catalog, delete
//! local files the backup no longer covers, re-enumerate, then download the
//! missing parts grouped per destination file. Every completed part is
//! fsynced at its declared offset before the next one starts, so rerunning
//! the engine after any interruption converges without redoing finished
//! parts.

use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tokio::sync::{broadcast, watch, Semaphore};
use tracing::info;

use crate::catalog::{parts_difference, parts_size, sort_parts, validate_parts};
use crate::part::Part;
use crate::storage::{LocalStore, RemoteStore};
use crate::{Error, Result};

/// Cadence of the download progress report.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Progress update published during the download phase
#[derive(Debug, Clone)]
pub struct RestoreProgress {
    /// Bytes downloaded so far
    pub bytes_downloaded: u64,
    /// Total bytes selected for download
    pub download_size: u64,
    /// Elapsed time since the run started, in milliseconds
    pub elapsed_ms: u64,
}

/// Final accounting for one restore run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Total declared size of the backup in bytes
    pub backup_size: u64,
    /// Bytes of local files deleted because the backup no longer covers them
    pub deleted_bytes: u64,
    /// Bytes downloaded from the source
    pub downloaded_bytes: u64,
    /// Number of local files deleted
    pub files_deleted: u64,
    /// Number of parts downloaded
    pub parts_downloaded: u64,
    /// Run start (epoch milliseconds)
    pub start_time: i64,
    /// Run end (epoch milliseconds)
    pub end_time: i64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Restore engine materializing a backup into a local directory.
pub struct RestoreEngine {
    src: Arc<dyn RemoteStore>,
    dst: LocalStore,
    concurrency: usize,
    progress_tx: broadcast::Sender<RestoreProgress>,
}

impl RestoreEngine {
    /// Create a new restore engine.
    ///
    /// `concurrency` bounds the number of files downloaded in parallel;
    /// parts of one file are always fetched sequentially in offset order.
    pub fn new(src: Arc<dyn RemoteStore>, dst: LocalStore, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let (progress_tx, _) = broadcast::channel(16);
        Ok(Self {
            src,
            dst,
            concurrency,
            progress_tx,
        })
    }

    /// Subscribe to progress updates
    pub fn progress_receiver(&self) -> broadcast::Receiver<RestoreProgress> {
        self.progress_tx.subscribe()
    }

    /// Run the restore to completion.
    ///
    /// The run is idempotent and resumable: a rerun against an unchanged
    /// source downloads nothing, and a rerun after an interruption picks up
    /// where the interrupted run stopped.
    pub async fn run(&self) -> Result<RestoreReport> {
        let started = Instant::now();
        let start_time = chrono::Utc::now().timestamp_millis();
        let src_name = self.src.describe();
        let dst_name = self.dst.describe();
        info!("starting restore from {} to {}", src_name, dst_name);

        info!("obtaining list of parts at {}", src_name);
        let mut src_parts = self.src.list_parts().await?;
        info!("obtaining list of parts at {}", dst_name);
        let dst_parts = self.dst.list_parts().await?;

        let backup_size = parts_size(&src_parts);

        // The source catalog must tile every file completely before any
        // local state is touched.
        sort_parts(&mut src_parts);
        validate_parts(&src_parts)?;

        // A local file with any part missing from the source is discarded
        // entirely: partial local data of unknown provenance is not trusted.
        let to_delete = parts_difference(&dst_parts, &src_parts);
        let mut deleted_bytes = 0u64;
        let mut files_deleted = 0u64;
        if !to_delete.is_empty() {
            let paths: BTreeSet<&str> = to_delete.iter().map(|p| p.path.as_str()).collect();
            info!("deleting {} files from {}", paths.len(), dst_name);
            for path in paths {
                info!("deleting {} from {}", path, dst_name);
                deleted_bytes += self.dst.delete_path(path).await?;
                files_deleted += 1;
            }
            self.dst.remove_empty_dirs().await?;
        }

        // Deletions may have removed files, so the local view is rebuilt.
        let dst_parts = self.dst.list_parts().await?;

        let to_copy = parts_difference(&src_parts, &dst_parts);
        let download_size = parts_size(&to_copy);
        let parts_downloaded = to_copy.len() as u64;
        if !to_copy.is_empty() {
            info!(
                "downloading {} parts from {} to {}",
                to_copy.len(),
                src_name,
                dst_name
            );
            self.download(to_copy, download_size, started).await?;
        }

        let duration = started.elapsed();
        info!(
            "restored {} bytes from backup in {:.3}s; deleted {} bytes; downloaded {} bytes",
            backup_size,
            duration.as_secs_f64(),
            deleted_bytes,
            download_size
        );

        Ok(RestoreReport {
            backup_size,
            deleted_bytes,
            downloaded_bytes: download_size,
            files_deleted,
            parts_downloaded,
            start_time,
            end_time: chrono::Utc::now().timestamp_millis(),
            duration_ms: duration.as_millis() as u64,
        })
    }

    /// Download phase: one worker per destination file, at most
    /// `concurrency` active at a time.
    async fn download(&self, to_copy: Vec<Part>, download_size: u64, started: Instant) -> Result<()> {
        let mut groups: BTreeMap<String, Vec<Part>> = BTreeMap::new();
        for part in to_copy {
            groups.entry(part.path.clone()).or_default().push(part);
        }

        let bytes_downloaded = Arc::new(AtomicU64::new(0));
        let aborted = Arc::new(AtomicBool::new(false));
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (done_tx, done_rx) = watch::channel(false);

        let ticker = tokio::spawn(progress_ticker(
            Arc::clone(&bytes_downloaded),
            download_size,
            started,
            self.src.describe(),
            self.dst.describe(),
            self.progress_tx.clone(),
            done_rx,
        ));

        let mut handles = Vec::new();
        for (_, mut parts) in groups {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            // Growing the file monotonically requires offset order.
            parts.sort_unstable_by_key(|p| p.offset);

            let src = Arc::clone(&self.src);
            let dst = self.dst.clone();
            let counter = Arc::clone(&bytes_downloaded);
            let aborted = Arc::clone(&aborted);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                download_group(src, dst, parts, counter, aborted).await
            }));
        }

        let results = futures::future::join_all(handles).await;
        let _ = done_tx.send(true);
        let _ = ticker.await;

        let mut first_err = None;
        for res in results {
            let worker_result = res.map_err(|e| {
                Error::Io(std::io::Error::other(format!("task join error: {}", e)))
            })?;
            if let Err(e) = worker_result {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Download the parts of one destination file, in offset order.
///
/// A fresh positioned writer is opened per part and closed (fsynced) before
/// the next part starts, so completed parts survive a crash. When another
/// worker has failed, the remaining parts are skipped; the next run picks
/// them up.
async fn download_group(
    src: Arc<dyn RemoteStore>,
    dst: LocalStore,
    parts: Vec<Part>,
    bytes_downloaded: Arc<AtomicU64>,
    aborted: Arc<AtomicBool>,
) -> Result<()> {
    for part in parts {
        if aborted.load(Ordering::SeqCst) {
            return Ok(());
        }
        info!(
            "downloading {} from {} to {}",
            part,
            src.describe(),
            dst.describe()
        );
        let result = download_one(&src, &dst, &part, &bytes_downloaded).await;
        if let Err(e) = result {
            aborted.store(true, Ordering::SeqCst);
            return Err(e);
        }
    }
    Ok(())
}

async fn download_one(
    src: &Arc<dyn RemoteStore>,
    dst: &LocalStore,
    part: &Part,
    bytes_downloaded: &Arc<AtomicU64>,
) -> Result<()> {
    let mut writer = dst.part_writer(part).await?;
    {
        let mut counting = CountingWriter {
            inner: &mut writer,
            counter: Arc::clone(bytes_downloaded),
        };
        src.download_part(part, &mut counting).await?;
    }
    writer.close().await
}

/// Periodic download progress report on a fixed cadence.
async fn progress_ticker(
    bytes_downloaded: Arc<AtomicU64>,
    download_size: u64,
    started: Instant,
    src_name: String,
    dst_name: String,
    progress_tx: broadcast::Sender<RestoreProgress>,
    mut done_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval_at(
        tokio::time::Instant::now() + PROGRESS_INTERVAL,
        PROGRESS_INTERVAL,
    );
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let n = bytes_downloaded.load(Ordering::Relaxed);
                let elapsed = started.elapsed();
                info!(
                    "downloaded {} out of {} bytes from {} to {} in {:.3}s",
                    n,
                    download_size,
                    src_name,
                    dst_name,
                    elapsed.as_secs_f64()
                );
                let _ = progress_tx.send(RestoreProgress {
                    bytes_downloaded: n,
                    download_size,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            changed = done_rx.changed() => {
                if changed.is_err() || *done_rx.borrow() {
                    return;
                }
            }
        }
    }
}

/// Writer wrapper feeding the shared progress counter on every write.
struct CountingWriter<'a, W> {
    inner: &'a mut W,
    counter: Arc<AtomicU64>,
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<'_, W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let poll = Pin::new(&mut *self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            self.counter.fetch_add(*n as u64, Ordering::Relaxed);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut *self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut *self.inner).poll_shutdown(cx)
    }
}
