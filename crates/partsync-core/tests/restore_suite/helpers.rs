//! Test helper utilities.
//!
//! Backup population and destination-tree inspection shared across the
//! restore scenarios.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use partsync_core::{LocalStore, MemoryRemote, Part, RestoreEngine, RestoreReport, Result};

/// Store `data` in the remote as the parts of one logical file.
pub async fn put_file(remote: &MemoryRemote, path: &str, data: &[u8]) {
    for part in Part::slice_file(path, data.len() as u64) {
        let lo = part.offset as usize;
        let hi = lo + part.size as usize;
        remote
            .put_part(&part, Bytes::copy_from_slice(&data[lo..hi]))
            .await
            .unwrap();
    }
}

/// Run a restore from `remote` into `dir` with a small worker pool.
pub async fn run_restore(remote: &Arc<MemoryRemote>, dir: &Path) -> Result<RestoreReport> {
    let src: Arc<dyn partsync_core::RemoteStore> = Arc::clone(remote) as Arc<dyn partsync_core::RemoteStore>;
    let engine = RestoreEngine::new(src, LocalStore::new(dir), 4)?;
    engine.run().await
}

/// Collect every regular file under `dir` as relative path -> contents.
pub fn read_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    if !dir.exists() {
        return files;
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                files.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    files
}
