//! partsync core library
//!
//! This crate provides the core functionality for restoring directory trees
//! of immutable files from part-granular object store backups. Files are
//! split on backup into byte ranges ("parts") whose object keys encode the
//! file path, total file size, offset and length; restoring is a reconcile
//! between the remote part catalog and the part view derived from the local
//! destination tree.

pub mod catalog;
pub mod error;
pub mod fsutil;
pub mod part;
pub mod restore;
pub mod storage;

pub use error::{Error, Result, StorageError};
pub use part::{Part, MAX_PART_SIZE};
pub use restore::{RestoreEngine, RestoreProgress, RestoreReport};
pub use storage::{
    create_remote, FilesystemRemote, GcsRemote, LocalStore, MemoryRemote, RemoteConfig,
    RemoteStore, S3Remote,
};
