//! Binary record format for DiskStack files
//!
//! A stack file is a flat run of records with no file header, magic or footer:
//!
//! ```text
//! [payload_length: u32 LE][payload bytes][record_extent: u64 LE]
//! ```
//!
//! `record_extent` is always `4 + payload_length + 8`. The length prefix lets
//! recovery walk the file forwards from byte 0; the trailer lets `top`/`pop`
//! step backwards from the logical end to the start of the newest record in
//! one read, whatever the depth of the stack.

use std::io::{Read, Seek, SeekFrom};

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{StackError, StackResult};

/// Size of the payload length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the record extent trailer in bytes
pub const TRAILER_SIZE: usize = 8;

/// Fixed per-record overhead: prefix + trailer
pub const RECORD_OVERHEAD: u64 = (LENGTH_PREFIX_SIZE + TRAILER_SIZE) as u64;

/// Total on-disk size of a record carrying `payload_len` bytes.
#[inline]
pub fn record_extent(payload_len: usize) -> u64 {
    RECORD_OVERHEAD + payload_len as u64
}

/// Reject payloads longer than `max` (itself capped by the u32 prefix).
pub fn check_payload_len(len: usize, max: u64) -> StackResult<()> {
    let max = max.min(MAX_PAYLOAD_SIZE);
    if len as u64 > max {
        return Err(StackError::PayloadTooLarge { size: len as u64, max });
    }
    Ok(())
}

/// Serialize one payload into a complete record.
pub fn encode(payload: &[u8]) -> StackResult<Vec<u8>> {
    // Validate before allocating
    check_payload_len(payload.len(), MAX_PAYLOAD_SIZE)?;

    let extent = record_extent(payload.len());
    let mut buffer = Vec::with_capacity(extent as usize);
    buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buffer.extend_from_slice(payload);
    buffer.extend_from_slice(&extent.to_le_bytes());
    Ok(buffer)
}

fn read_at<R: Read + Seek>(reader: &mut R, position: u64, buf: &mut [u8]) -> StackResult<()> {
    reader.seek(SeekFrom::Start(position))?;
    reader.read_exact(buf)?;
    Ok(())
}

fn corrupted(offset: u64, reason: String) -> StackError {
    StackError::Corrupted { path: None, offset, reason }
}

/// Decode the record starting at `position`, reading no further than `end`.
///
/// Returns the payload and the position just past the record's trailer. A
/// record that would extend beyond `end`, or whose trailer disagrees with its
/// length prefix, is reported as `Corrupted` at `position`.
pub fn decode_forward<R: Read + Seek>(
    reader: &mut R,
    position: u64,
    end: u64,
) -> StackResult<(Vec<u8>, u64)> {
    if position + LENGTH_PREFIX_SIZE as u64 > end {
        return Err(corrupted(
            position,
            format!("length prefix truncated: {} bytes before end of file", end - position.min(end)),
        ));
    }

    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    read_at(reader, position, &mut len_buf)?;
    let payload_len = u32::from_le_bytes(len_buf) as usize;
    let extent = record_extent(payload_len);

    if position + extent > end {
        return Err(corrupted(
            position,
            format!("record needs {} bytes, only {} available", extent, end - position),
        ));
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    let mut trailer = [0u8; TRAILER_SIZE];
    reader.read_exact(&mut trailer)?;
    let stored_extent = u64::from_le_bytes(trailer);
    if stored_extent != extent {
        return Err(corrupted(
            position,
            format!("trailer says {} bytes, length prefix implies {}", stored_extent, extent),
        ));
    }

    Ok((payload, position + extent))
}

/// Decode the record that ends exactly at `end_position`.
///
/// Reads the trailer just before `end_position`, jumps back by the stored
/// extent and reads the payload from there. Returns the payload and the
/// position where the record starts.
pub fn decode_backward<R: Read + Seek>(
    reader: &mut R,
    end_position: u64,
) -> StackResult<(Vec<u8>, u64)> {
    if end_position < RECORD_OVERHEAD {
        return Err(corrupted(
            end_position,
            format!("logical end {} is shorter than one record", end_position),
        ));
    }

    let mut trailer = [0u8; TRAILER_SIZE];
    read_at(reader, end_position - TRAILER_SIZE as u64, &mut trailer)?;
    let extent = u64::from_le_bytes(trailer);

    if extent < RECORD_OVERHEAD || extent > end_position {
        return Err(corrupted(
            end_position - TRAILER_SIZE as u64,
            format!("record extent {} out of range (min {}, max {})", extent, RECORD_OVERHEAD, end_position),
        ));
    }

    let start = end_position - extent;
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    read_at(reader, start, &mut len_buf)?;
    let payload_len = u32::from_le_bytes(len_buf) as usize;

    if record_extent(payload_len) != extent {
        return Err(corrupted(
            start,
            format!("length prefix {} disagrees with trailer extent {}", payload_len, extent),
        ));
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;
    Ok((payload, start))
}
