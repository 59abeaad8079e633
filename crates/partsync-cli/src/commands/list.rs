use anyhow::Result;
use partsync_core::catalog::{parts_size, sort_parts, validate_parts};
use partsync_core::{create_remote, RemoteConfig};
use serde_json::json;
use tracing::info;

pub async fn run(src: &str, format: &str) -> Result<()> {
    let config = RemoteConfig::from_url(src)?;
    let remote = create_remote(&config)?;

    info!("obtaining list of parts at {}", remote.describe());
    let mut parts = remote.list_parts().await?;
    sort_parts(&mut parts);
    validate_parts(&parts)?;

    // One row per logical file; the parts are already grouped by path.
    let mut files: Vec<(String, u64, u64)> = Vec::new();
    for part in &parts {
        match files.last_mut() {
            Some((path, _, count)) if *path == part.path => *count += 1,
            _ => files.push((part.path.clone(), part.file_size, 1)),
        }
    }

    match format {
        "json" => {
            let rows: Vec<_> = files
                .iter()
                .map(|(path, size, part_count)| {
                    json!({ "path": path, "size": size, "parts": part_count })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "files": rows,
                    "total_size": parts_size(&parts),
                }))?
            );
        }
        _ => {
            if files.is_empty() {
                println!("No files found at {}", remote.describe());
            } else {
                println!("Files in backup at {}:", remote.describe());
                for (path, size, part_count) in &files {
                    println!("  {} ({} bytes, {} parts)", path, size, part_count);
                }
                println!("Total: {} files, {} bytes", files.len(), parts_size(&parts));
            }
        }
    }

    Ok(())
}
