use anyhow::Result;
use partsync_core::{create_remote, LocalStore, RemoteConfig, RestoreEngine};
use tracing::info;

pub async fn run(src: &str, storage_data_path: &str, concurrency: usize) -> Result<()> {
    if storage_data_path.is_empty() {
        anyhow::bail!("--storageDataPath cannot be empty");
    }

    let config = RemoteConfig::from_url(src)?;
    let remote = create_remote(&config)?;
    let dst = LocalStore::new(storage_data_path);

    let engine = RestoreEngine::new(remote, dst, concurrency)?;
    let report = engine.run().await?;

    info!(
        "restore completed successfully: {} bytes restored, {} parts downloaded, {} files deleted",
        report.backup_size, report.parts_downloaded, report.files_deleted
    );
    Ok(())
}
