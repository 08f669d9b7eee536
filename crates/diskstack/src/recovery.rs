//! Recovery scan run when a stack file is opened
//!
//! Nothing about the logical end of the stack is persisted. `open` rebuilds
//! it by walking the file forwards from byte 0, record by record, until the
//! physical end is reached or a record turns out to be incomplete.
//!
//! An incomplete record can only be the tail of a `put` that was interrupted
//! by a crash, so the scan stops there and reports it. What happens to those
//! bytes is the engine's call (see `RecoveryPolicy`).

use std::io::{Read, Seek};

use crate::error::{StackError, StackResult};
use crate::format::decode_forward;

/// Outcome of a recovery scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    /// End of the last complete record
    pub offset: u64,
    /// Number of complete records
    pub records: u64,
    /// Physical length that was scanned
    pub file_len: u64,
    /// Set when bytes past `offset` do not form a complete record
    pub torn: Option<TornTail>,
}

/// An incomplete record found at the end of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TornTail {
    /// Where the incomplete record starts (equal to `Recovery::offset`)
    pub offset: u64,
    /// Bytes from `offset` to the physical end
    pub discarded_bytes: u64,
    /// Why the record was rejected
    pub reason: String,
}

impl TornTail {
    /// The torn tail as an error, for callers that refuse to repair.
    pub fn to_error(&self) -> StackError {
        StackError::Corrupted {
            path: None,
            offset: self.offset,
            reason: format!("torn record ({} trailing bytes): {}", self.discarded_bytes, self.reason),
        }
    }
}

/// Walk records from byte 0 up to `file_len`.
///
/// Only I/O failures are returned as errors; a torn record ends the scan and
/// is described in `Recovery::torn`.
pub fn scan<R: Read + Seek>(reader: &mut R, file_len: u64) -> StackResult<Recovery> {
    let mut offset = 0u64;
    let mut records = 0u64;

    while offset < file_len {
        match decode_forward(reader, offset, file_len) {
            Ok((_, next)) => {
                offset = next;
                records += 1;
            }
            Err(StackError::Corrupted { reason, .. }) => {
                return Ok(Recovery {
                    offset,
                    records,
                    file_len,
                    torn: Some(TornTail {
                        offset,
                        discarded_bytes: file_len - offset,
                        reason,
                    }),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Recovery { offset, records, file_len, torn: None })
}
