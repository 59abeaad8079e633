//! Pure algorithms over part sets: canonical ordering, tiling validation,
//! set difference and size accounting.

use std::collections::HashSet;

use crate::part::Part;
use crate::{Error, Result};

/// Sort parts into the canonical `(path ascending, offset ascending)` order.
pub fn sort_parts(parts: &mut [Part]) {
    parts.sort_unstable_by(|a, b| a.path.cmp(&b.path).then(a.offset.cmp(&b.offset)));
}

/// Validate that a sorted part sequence tiles every file it mentions.
///
/// For each path the intervals `[offset, offset + size)` must partition
/// `[0, file_size)` with no overlap and no gap, and every part's declared
/// size must match the size observed by the backend listing. The input must
/// already be in [`sort_parts`] order.
pub fn validate_parts(parts: &[Part]) -> Result<()> {
    let mut offset = 0u64;
    let mut first: Option<&Part> = None;
    for p in parts {
        // `f` is the first part of the file currently being walked.
        let f = match first {
            Some(f) if f.path == p.path => f,
            prev => {
                if let Some(f) = prev {
                    if offset != f.file_size {
                        return Err(Error::InvalidPartSet(format!(
                            "invalid size for {:?}; got {}; want {}",
                            f.path, offset, f.file_size
                        )));
                    }
                }
                first = Some(p);
                offset = 0;
                p
            }
        };
        if p.offset < offset {
            return Err(Error::InvalidPartSet(format!(
                "there is an overlap in {} bytes between {} and {}",
                offset - p.offset,
                f,
                p
            )));
        }
        if p.offset > offset {
            if offset == 0 {
                return Err(Error::InvalidPartSet(format!(
                    "there is a gap in {} bytes from file start to {}",
                    p.offset, p
                )));
            }
            return Err(Error::InvalidPartSet(format!(
                "there is a gap in {} bytes between {} and {}",
                p.offset - offset,
                f,
                p
            )));
        }
        if p.size != p.actual_size {
            return Err(Error::InvalidPartSet(format!(
                "invalid size for {}; got {}; want {}",
                p, p.actual_size, p.size
            )));
        }
        offset += p.size;
    }
    if let Some(f) = first {
        if offset != f.file_size {
            return Err(Error::InvalidPartSet(format!(
                "invalid size for {:?}; got {}; want {}",
                f.path, offset, f.file_size
            )));
        }
    }
    Ok(())
}

/// Return the parts of `a` that are not present in `b`, compared by part
/// identity (`actual_size` is ignored). The result preserves `a`'s order.
pub fn parts_difference(a: &[Part], b: &[Part]) -> Vec<Part> {
    let known: HashSet<_> = b.iter().map(|p| p.key()).collect();
    a.iter().filter(|p| !known.contains(&p.key())).cloned().collect()
}

/// Total declared size in bytes of all parts in the set.
pub fn parts_size(parts: &[Part]) -> u64 {
    parts.iter().map(|p| p.size).sum()
}
