//! Error types for DiskStack operations
//!
//! Every fallible operation returns a `StackError`. I/O failures carry the
//! path of the backing file whenever the engine knows it, so a caller can
//! report which store failed without extra bookkeeping.

use std::path::{Path, PathBuf};

/// DiskStack error types with detailed context
#[derive(Debug, Clone, thiserror::Error)]
pub enum StackError {
    /// Underlying open/read/write/flush/truncate failed
    #[error("I/O error{}: {message} ({kind})", path_suffix(.path))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Payload does not fit the 4-byte length prefix (or the configured cap)
    #[error("payload too large: {size} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge {
        /// Size of the rejected payload
        size: u64,
        /// Maximum accepted size
        max: u64,
    },

    /// A record on disk is torn or inconsistent with its neighbours
    #[error("store corrupted{} at offset {offset}: {reason}", path_suffix(.path))]
    Corrupted {
        /// Backing file, when known
        path: Option<PathBuf>,
        /// Byte offset of the offending record
        offset: u64,
        /// Description of the corruption
        reason: String,
    },

    /// Operation attempted after `close()`
    #[error("stack is closed")]
    Closed,

    /// Configuration rejected by `Config::validate`
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" in {}", p.display()),
        None => String::new(),
    }
}

impl StackError {
    /// Build an `Io` error tagged with the file it happened on.
    pub fn io(path: &Path, err: std::io::Error, what: &str) -> Self {
        StackError::Io {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", what, err),
        }
    }

    /// Attach `path` to errors that were raised without one.
    ///
    /// The record codec works on any `Read + Seek` and has no idea which
    /// file it is reading; the engine calls this on the way out.
    pub fn with_path(self, path: &Path) -> Self {
        match self {
            StackError::Io { path: None, kind, message } => StackError::Io {
                path: Some(path.to_path_buf()),
                kind,
                message,
            },
            StackError::Corrupted { path: None, offset, reason } => StackError::Corrupted {
                path: Some(path.to_path_buf()),
                offset,
                reason,
            },
            other => other,
        }
    }

    /// True for `Corrupted`.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StackError::Corrupted { .. })
    }
}

/// Convert std::io::Error to StackError::Io
impl From<std::io::Error> for StackError {
    fn from(err: std::io::Error) -> Self {
        StackError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for DiskStack operations
pub type StackResult<T> = Result<T, StackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StackError::Corrupted {
            path: Some(PathBuf::from("/tmp/stack.db")),
            offset: 96,
            reason: "record extent 4 below minimum 12".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("/tmp/stack.db"));
        assert!(display.contains("offset 96"));
        assert!(display.contains("minimum 12"));
    }

    #[test]
    fn test_payload_too_large_display() {
        let err = StackError::PayloadTooLarge { size: 10, max: 8 };
        assert_eq!(err.to_string(), "payload too large: 10 bytes exceeds limit of 8 bytes");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let stack_err: StackError = io_err.into();

        match stack_err {
            StackError::Io { kind, path, .. } => {
                assert_eq!(kind, std::io::ErrorKind::NotFound);
                assert!(path.is_none());
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_with_path_fills_missing_path_only() {
        let err = StackError::Corrupted { path: None, offset: 0, reason: "x".into() };
        let err = err.with_path(Path::new("/a"));
        assert!(matches!(&err, StackError::Corrupted { path: Some(p), .. } if p == Path::new("/a")));

        // An existing path is kept
        let err = err.with_path(Path::new("/b"));
        assert!(matches!(&err, StackError::Corrupted { path: Some(p), .. } if p == Path::new("/a")));

        assert!(matches!(StackError::Closed.with_path(Path::new("/a")), StackError::Closed));
    }
}
