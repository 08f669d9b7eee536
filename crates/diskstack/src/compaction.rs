//! Compaction — reclaiming space freed by pops
//!
//! A pop only moves the logical end of the stack back; the popped record's
//! bytes stay in the file as fragments. Compaction truncates the file to the
//! logical end. Truncation is a metadata operation on most filesystems, so
//! the cost does not depend on how many bytes are discarded.
//!
//! Compaction always runs synchronously on the caller's thread, from inside
//! `pop`, `compact` or `close`. Nothing is deferred.

use std::fs::File;
use std::path::Path;

use crate::error::{StackError, StackResult};
use crate::platform_durability::durable_sync;

/// Result of a compaction operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Physical file size before truncation
    pub original_bytes: u64,
    /// Physical file size after truncation (the logical offset)
    pub compacted_bytes: u64,
}

impl CompactionResult {
    /// Space reclaimed in bytes.
    pub fn bytes_saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.compacted_bytes)
    }
}

/// Decide whether accumulated fragments justify a truncate.
///
/// Zero fragments never compact, so an empty pop or a threshold of zero with
/// nothing popped is a no-op.
pub fn should_compact(fragments: u64, threshold: u64) -> bool {
    fragments > 0 && fragments >= threshold
}

/// Truncate `file` to exactly `offset` bytes and make the new length durable.
///
/// `path` is only used for error context.
pub fn compact(file: &File, path: &Path, offset: u64) -> StackResult<CompactionResult> {
    let original_bytes = file
        .metadata()
        .map_err(|e| StackError::io(path, e, "Failed to stat file for compaction"))?
        .len();

    file.set_len(offset)
        .map_err(|e| StackError::io(path, e, "Failed to truncate file"))?;

    durable_sync(file).map_err(|e| StackError::io(path, e, "Failed to sync truncated file"))?;

    Ok(CompactionResult { original_bytes, compacted_bytes: offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_compact_truncates_to_offset() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&[0xAB; 96]).unwrap();

        let result = compact(tmp.as_file(), tmp.path(), 32).unwrap();

        assert_eq!(result.original_bytes, 96);
        assert_eq!(result.compacted_bytes, 32);
        assert_eq!(result.bytes_saved(), 64);
        assert_eq!(std::fs::metadata(tmp.path()).unwrap().len(), 32);
        // Surviving prefix untouched
        assert_eq!(std::fs::read(tmp.path()).unwrap(), vec![0xAB; 32]);
    }

    #[test]
    fn test_compact_to_zero() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"stale").unwrap();

        let result = compact(tmp.as_file(), tmp.path(), 0).unwrap();
        assert_eq!(result.bytes_saved(), 5);
        assert_eq!(std::fs::metadata(tmp.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_should_compact_threshold() {
        // Eager
        assert!(should_compact(16, 0));
        assert!(!should_compact(0, 0));

        // Batched
        assert!(!should_compact(48, 64));
        assert!(should_compact(64, 64));
        assert!(should_compact(80, 64));
    }
}
