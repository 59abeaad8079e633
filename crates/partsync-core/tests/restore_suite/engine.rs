//! Restore engine end-to-end scenarios.
//!
//! Each test drives the full pipeline: list both sides, validate the source
//! catalog, reconcile, download, and verify the destination tree and the
//! reported byte totals.

use std::sync::Arc;

use bytes::Bytes;
use partsync_core::{FilesystemRemote, LocalStore, MemoryRemote, Part, RestoreEngine};
use tempfile::TempDir;

use super::helpers::{put_file, read_tree, run_restore};

#[tokio::test]
async fn fresh_restore_materializes_the_tree() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "a.bin", &[0x01, 0x02, 0x03]).await;
    put_file(&remote, "sub/b.bin", b"").await;

    let dst = TempDir::new().unwrap();
    let report = run_restore(&remote, dst.path()).await.unwrap();

    let tree = read_tree(dst.path());
    assert_eq!(tree.len(), 2);
    assert_eq!(tree["a.bin"], vec![0x01, 0x02, 0x03]);
    assert_eq!(tree["sub/b.bin"], Vec::<u8>::new());

    assert_eq!(report.backup_size, 3);
    assert_eq!(report.downloaded_bytes, 3);
    assert_eq!(report.deleted_bytes, 0);
    assert_eq!(report.parts_downloaded, 2);
    assert_eq!(report.files_deleted, 0);
}

#[tokio::test]
async fn second_run_downloads_and_deletes_nothing() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "a.bin", &[0x01, 0x02, 0x03]).await;
    put_file(&remote, "sub/b.bin", b"").await;

    let dst = TempDir::new().unwrap();
    run_restore(&remote, dst.path()).await.unwrap();
    let before = read_tree(dst.path());

    let report = run_restore(&remote, dst.path()).await.unwrap();
    assert_eq!(report.downloaded_bytes, 0);
    assert_eq!(report.deleted_bytes, 0);
    assert_eq!(report.parts_downloaded, 0);
    assert_eq!(read_tree(dst.path()), before);
}

#[tokio::test]
async fn stale_local_file_is_deleted_without_redownload() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "a.bin", b"abc").await;

    let dst = TempDir::new().unwrap();
    std::fs::write(dst.path().join("a.bin"), b"abc").unwrap();
    std::fs::write(dst.path().join("stale.bin"), b"old bytes").unwrap();

    let report = run_restore(&remote, dst.path()).await.unwrap();

    let tree = read_tree(dst.path());
    assert_eq!(tree.len(), 1);
    assert_eq!(tree["a.bin"], b"abc");
    assert_eq!(report.deleted_bytes, 9);
    assert_eq!(report.files_deleted, 1);
    assert_eq!(report.downloaded_bytes, 0);
}

#[tokio::test]
async fn stale_directories_are_pruned_after_deletion() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "keep.bin", b"k").await;

    let dst = TempDir::new().unwrap();
    std::fs::create_dir_all(dst.path().join("old/nested")).unwrap();
    std::fs::write(dst.path().join("old/nested/gone.bin"), b"xx").unwrap();

    run_restore(&remote, dst.path()).await.unwrap();

    assert!(!dst.path().join("old").exists());
    assert_eq!(read_tree(dst.path()).len(), 1);
}

#[tokio::test]
async fn local_file_with_changed_size_is_refetched_entirely() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "a.bin", b"abc").await;

    // The local copy has a different length, so its single part carries a
    // different file_size and matches nothing in the backup.
    let dst = TempDir::new().unwrap();
    std::fs::write(dst.path().join("a.bin"), b"abcd").unwrap();

    let report = run_restore(&remote, dst.path()).await.unwrap();

    assert_eq!(read_tree(dst.path())["a.bin"], b"abc");
    assert_eq!(report.deleted_bytes, 4);
    assert_eq!(report.downloaded_bytes, 3);
}

#[tokio::test]
async fn corrupt_backup_aborts_before_touching_destination() {
    let remote = Arc::new(MemoryRemote::new());
    // The backup declares a 10-byte file but only provides 4 bytes.
    let short = Part {
        path: "f".to_string(),
        file_size: 10,
        offset: 0,
        size: 4,
        actual_size: 4,
    };
    remote.put_part(&short, Bytes::from_static(b"abcd")).await.unwrap();

    let dst = TempDir::new().unwrap();
    std::fs::write(dst.path().join("untouched.bin"), b"local").unwrap();

    let err = run_restore(&remote, dst.path()).await.unwrap_err();
    assert!(
        err.to_string().contains("invalid size for \"f\"; got 4; want 10"),
        "{}",
        err
    );
    // Validation failed before the delete phase ran.
    assert_eq!(read_tree(dst.path())["untouched.bin"], b"local");
}

#[tokio::test]
async fn gap_between_parts_is_rejected() {
    let remote = Arc::new(MemoryRemote::new());
    let first = Part {
        path: "f".to_string(),
        file_size: 10,
        offset: 0,
        size: 4,
        actual_size: 4,
    };
    let third = Part {
        path: "f".to_string(),
        file_size: 10,
        offset: 6,
        size: 4,
        actual_size: 4,
    };
    remote.put_part(&first, Bytes::from_static(b"abcd")).await.unwrap();
    remote.put_part(&third, Bytes::from_static(b"ghij")).await.unwrap();

    let dst = TempDir::new().unwrap();
    let err = run_restore(&remote, dst.path()).await.unwrap_err();
    assert!(err.to_string().contains("gap in 2 bytes"), "{}", err);
}

#[tokio::test]
async fn resume_after_partial_restore_fetches_only_missing_files() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "a.bin", &[0x01, 0x02, 0x03]).await;
    put_file(&remote, "sub/b.bin", b"xy").await;

    // As if a previous run was killed after a.bin was written and fsynced.
    let dst = TempDir::new().unwrap();
    std::fs::write(dst.path().join("a.bin"), [0x01, 0x02, 0x03]).unwrap();

    let report = run_restore(&remote, dst.path()).await.unwrap();

    assert_eq!(report.downloaded_bytes, 2);
    assert_eq!(report.deleted_bytes, 0);
    let tree = read_tree(dst.path());
    assert_eq!(tree["a.bin"], vec![0x01, 0x02, 0x03]);
    assert_eq!(tree["sub/b.bin"], b"xy");
}

#[tokio::test]
async fn junk_objects_in_the_backup_are_ignored() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "a.bin", b"abc").await;
    remote
        .put_object("README.md", Bytes::from_static(b"not a part"))
        .await
        .unwrap();

    let dst = TempDir::new().unwrap();
    let report = run_restore(&remote, dst.path()).await.unwrap();

    let tree = read_tree(dst.path());
    assert_eq!(tree.len(), 1);
    assert!(tree.contains_key("a.bin"));
    assert_eq!(report.backup_size, 3);
}

#[tokio::test]
async fn empty_source_clears_the_destination() {
    let remote = Arc::new(MemoryRemote::new());

    let dst = TempDir::new().unwrap();
    std::fs::create_dir_all(dst.path().join("sub")).unwrap();
    std::fs::write(dst.path().join("sub/f.bin"), b"abcde").unwrap();
    std::fs::write(dst.path().join("g.bin"), b"xyz").unwrap();

    let report = run_restore(&remote, dst.path()).await.unwrap();

    assert!(read_tree(dst.path()).is_empty());
    assert!(!dst.path().join("sub").exists());
    assert!(dst.path().exists());
    assert_eq!(report.backup_size, 0);
    assert_eq!(report.deleted_bytes, 8);
    assert_eq!(report.files_deleted, 2);
}

#[tokio::test]
async fn restore_into_missing_destination_creates_it() {
    let remote = Arc::new(MemoryRemote::new());
    put_file(&remote, "deep/tree/a.bin", b"data").await;

    let tmp = TempDir::new().unwrap();
    let dst = tmp.path().join("not-yet-created");
    let report = run_restore(&remote, &dst).await.unwrap();

    assert_eq!(read_tree(&dst)["deep/tree/a.bin"], b"data");
    assert_eq!(report.downloaded_bytes, 4);
}

#[tokio::test]
async fn many_files_restore_concurrently() {
    let remote = Arc::new(MemoryRemote::new());
    let mut expected_size = 0u64;
    for i in 0usize..32 {
        let data = vec![i as u8; (i % 7) + 1];
        expected_size += data.len() as u64;
        put_file(&remote, &format!("dir{}/f{}.bin", i % 4, i), &data).await;
    }

    let dst = TempDir::new().unwrap();
    let report = run_restore(&remote, dst.path()).await.unwrap();

    assert_eq!(report.downloaded_bytes, expected_size);
    let tree = read_tree(dst.path());
    assert_eq!(tree.len(), 32);
    for i in 0..32 {
        let data = vec![i as u8; (i % 7) + 1];
        assert_eq!(tree[&format!("dir{}/f{}.bin", i % 4, i)], data);
    }
}

#[tokio::test]
async fn filesystem_remote_restores_end_to_end() {
    // Backup laid out on disk in the object-per-part scheme.
    let backup = TempDir::new().unwrap();
    for (path, data) in [("a.bin", &b"abc"[..]), ("sub/b.bin", &b"defgh"[..])] {
        for part in Part::slice_file(path, data.len() as u64) {
            let object = backup.path().join(part.remote_key());
            std::fs::create_dir_all(object.parent().unwrap()).unwrap();
            std::fs::write(&object, data).unwrap();
        }
    }

    let dst = TempDir::new().unwrap();
    let src: Arc<dyn partsync_core::RemoteStore> =
        Arc::new(FilesystemRemote::new(backup.path().to_path_buf()));
    let engine = RestoreEngine::new(src, LocalStore::new(dst.path()), 2).unwrap();
    let report = engine.run().await.unwrap();

    let tree = read_tree(dst.path());
    assert_eq!(tree["a.bin"], b"abc");
    assert_eq!(tree["sub/b.bin"], b"defgh");
    assert_eq!(report.backup_size, 8);
    assert_eq!(report.downloaded_bytes, 8);
}
