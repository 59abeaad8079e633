//! Part model and remote key encoding.
//!
//! A part is a contiguous byte range of one logical file, stored as a single
//! object on the remote side. Its identity is `(path, file_size, offset,
//! size)`; the remote object key is a deterministic encoding of exactly those
//! fields, so a listing alone is enough to reconstruct the full catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum size in bytes for a single part.
///
/// Files larger than this are split into consecutive parts of exactly this
/// size plus a trailing remainder. The constant is part of the wire contract
/// with the tool that wrote the backup: both sides must slice identically,
/// or the listing diff degenerates and whole files get re-fetched. The 1 GiB
/// value here is an assumption; it has not been verified against any
/// particular backup writer, so check the producer's slicing constant before
/// restoring a backup made elsewhere.
pub const MAX_PART_SIZE: u64 = 1024 * 1024 * 1024;

/// A single byte range of one logical file within a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Relative forward-slash path of the logical file within the backup root.
    pub path: String,

    /// Total byte length of the logical file this part belongs to.
    pub file_size: u64,

    /// Byte offset of this part's first byte within the logical file.
    pub offset: u64,

    /// Declared byte length of this part.
    pub size: u64,

    /// Observed byte length of the stored object, as reported by the backend
    /// listing. Equals `size` for a valid backup. Not part of the identity.
    pub actual_size: u64,
}

impl Part {
    /// Identity tuple used when diffing part sets. `actual_size` is a
    /// verification field and is deliberately excluded.
    pub fn key(&self) -> (&str, u64, u64, u64) {
        (&self.path, self.file_size, self.offset, self.size)
    }

    /// Remote object key of this part, relative to the backup root:
    /// `{path}/{FILE_SIZE}_{OFFSET}_{SIZE}` with zero-padded 16-digit
    /// uppercase hex fields.
    ///
    /// The field order, widths and separators are part of the assumed wire
    /// contract with the backup writer (see [`MAX_PART_SIZE`]); a writer
    /// using a different key scheme will simply have all its objects skipped
    /// as unknown at listing time.
    pub fn remote_key(&self) -> String {
        format!(
            "{}/{:016X}_{:016X}_{:016X}",
            self.path, self.file_size, self.offset, self.size
        )
    }

    /// Parse a relative remote object key produced by [`Part::remote_key`].
    ///
    /// Returns `None` for keys that do not follow the part naming scheme;
    /// listings skip such objects. `actual_size` is left at 0 for the caller
    /// to fill in from the backend's reported object size.
    pub fn parse_remote_key(key: &str) -> Option<Part> {
        let (path, name) = key.rsplit_once('/')?;
        let mut fields = name.split('_');
        let file_size = parse_hex_field(fields.next()?)?;
        let offset = parse_hex_field(fields.next()?)?;
        let size = parse_hex_field(fields.next()?)?;
        if fields.next().is_some() {
            return None;
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return None;
        }
        // Keys that would escape or alias the destination root are not parts.
        if path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return None;
        }
        Some(Part {
            path: path.to_string(),
            file_size,
            offset,
            size,
            actual_size: 0,
        })
    }

    /// Slice one local file into its canonical part sequence.
    ///
    /// A zero-length file maps to a single zero-size part; otherwise the file
    /// is cut into `MAX_PART_SIZE` ranges with a trailing remainder.
    /// `actual_size` is set equal to `size` since the slices describe bytes
    /// actually present on disk.
    pub fn slice_file(path: &str, file_size: u64) -> Vec<Part> {
        if file_size == 0 {
            return vec![Part {
                path: path.to_string(),
                file_size: 0,
                offset: 0,
                size: 0,
                actual_size: 0,
            }];
        }
        let mut parts = Vec::new();
        let mut offset = 0;
        while offset < file_size {
            let size = (file_size - offset).min(MAX_PART_SIZE);
            parts.push(Part {
                path: path.to_string(),
                file_size,
                offset,
                size,
                actual_size: size,
            });
            offset += size;
        }
        parts
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "part{{path: {:?}, file_size: {}, offset: {}, size: {}}}",
            self.path, self.file_size, self.offset, self.size
        )
    }
}

/// Parse one zero-padded 16-digit uppercase hex field.
fn parse_hex_field(s: &str) -> Option<u64> {
    if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}
