//! Stack engine — the heart of DiskStack.
//!
//! `DiskStack` owns one open file and two numbers derived from it:
//!
//! - `offset`: the logical end of the stack. `put` writes here, `top`/`pop`
//!   read the newest record's trailer just before it.
//! - `fragments`: bytes past `offset` left behind by pops and not yet
//!   truncated away.
//!
//! Neither is persisted. `open` recomputes `offset` with a forward scan and
//! starts with zero fragments, so anything past the logical end must be
//! truncated before the handle is released; `close` (and `Drop`) do that.
//!
//! The engine takes `&mut self` everywhere and has no internal locking. Wrap
//! it in `SharedStack` to share it between threads.
//!
//! Once `close` has run every operation returns `StackError::Closed`.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::compaction::{compact, should_compact, CompactionResult};
use crate::config::{Config, RecoveryPolicy};
use crate::error::{StackError, StackResult};
use crate::format::{check_payload_len, decode_backward, encode};
use crate::platform_durability::{durable_sync, sync_parent_dir};
use crate::recovery;

/// Durable LIFO stack stored in a single file.
#[derive(Debug)]
pub struct DiskStack {
    /// Backing file; `None` once closed
    file: Option<File>,
    /// Backing file path (for error context)
    path: PathBuf,
    /// Logical end of valid data
    offset: u64,
    /// Reclaimable bytes past `offset`
    fragments: u64,
    /// Number of records below `offset`
    records: u64,
    config: Config,
}

impl DiskStack {
    /// Open or create a stack file at `path`.
    ///
    /// Scans the file from the start to find the logical end. A torn record
    /// at the tail is handled according to `config.recovery`: truncated away
    /// by default, or reported as `StackError::Corrupted` under
    /// `RecoveryPolicy::Strict`. The file handle is released on every error
    /// path.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StackResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StackError::io(&path, e, "Failed to open stack file"))?;

        if !existed {
            sync_parent_dir(&path)
                .map_err(|e| StackError::io(&path, e, "Failed to sync parent directory"))?;
        }

        let file_len = file
            .metadata()
            .map_err(|e| StackError::io(&path, e, "Failed to stat stack file"))?
            .len();

        let recovered = recovery::scan(&mut file, file_len).map_err(|e| e.with_path(&path))?;

        if let Some(torn) = &recovered.torn {
            match config.recovery {
                RecoveryPolicy::Strict => return Err(torn.to_error().with_path(&path)),
                RecoveryPolicy::TruncateTorn => {
                    warn!(
                        path = %path.display(),
                        offset = torn.offset,
                        discarded_bytes = torn.discarded_bytes,
                        "discarding torn record: {}", torn.reason
                    );
                    file.set_len(recovered.offset)
                        .map_err(|e| StackError::io(&path, e, "Failed to truncate torn record"))?;
                    durable_sync(&file)
                        .map_err(|e| StackError::io(&path, e, "Failed to sync after truncating torn record"))?;
                }
            }
        }

        debug!(
            path = %path.display(),
            offset = recovered.offset,
            records = recovered.records,
            file_len,
            "opened stack"
        );

        Ok(Self {
            file: Some(file),
            path,
            offset: recovered.offset,
            fragments: 0,
            records: recovered.records,
            config,
        })
    }

    /// Push `payload`.
    ///
    /// With `sync_on_put` (the default) the record is on persistent storage
    /// before this returns. On failure the logical end does not move.
    pub fn put(&mut self, payload: &[u8]) -> StackResult<()> {
        let sync = self.config.sync_on_put;
        self.append(payload, sync)
    }

    /// Push `payload` without syncing. Pair with `sync()` to make a batch of
    /// pushes durable with one flush.
    pub fn put_fast(&mut self, payload: &[u8]) -> StackResult<()> {
        self.append(payload, false)
    }

    fn append(&mut self, payload: &[u8], sync: bool) -> StackResult<()> {
        let file = self.file.as_mut().ok_or(StackError::Closed)?;
        check_payload_len(payload.len(), self.config.max_payload_size)?;
        let record = encode(payload)?;
        let extent = record.len() as u64;

        // Stale popped bytes past `offset` would outlive a shorter record and
        // be parsed as records by the next open scan.
        if self.fragments > 0 {
            file.set_len(self.offset)
                .map_err(|e| StackError::io(&self.path, e, "Failed to drop fragments before append"))?;
            self.fragments = 0;
        }

        let written = file
            .seek(SeekFrom::Start(self.offset))
            .and_then(|_| file.write_all(&record))
            .map_err(|e| StackError::io(&self.path, e, "Failed to append record"))
            .and_then(|_| {
                if sync {
                    durable_sync(file).map_err(|e| StackError::io(&self.path, e, "Failed to sync record"))
                } else {
                    Ok(())
                }
            });

        if let Err(e) = written {
            // A partial write may have grown the file; count it as fragments
            // so the next compaction reclaims it.
            if let Ok(meta) = file.metadata() {
                self.fragments = meta.len().saturating_sub(self.offset);
            }
            return Err(e);
        }

        self.offset += extent;
        self.records += 1;
        Ok(())
    }

    /// Return the newest payload without removing it. `None` when empty.
    pub fn top(&mut self) -> StackResult<Option<Vec<u8>>> {
        let file = self.file.as_mut().ok_or(StackError::Closed)?;
        if self.offset == 0 {
            return Ok(None);
        }
        let (payload, _) = decode_backward(file, self.offset).map_err(|e| e.with_path(&self.path))?;
        Ok(Some(payload))
    }

    /// Remove and return the newest payload. `None` when empty.
    ///
    /// Compacts before returning once fragments reach the configured
    /// threshold. If that truncate fails the pop has still happened: the
    /// error is returned, the logical state stays popped, and the bytes are
    /// reclaimed by a later compaction.
    pub fn pop(&mut self) -> StackResult<Option<Vec<u8>>> {
        let file = self.file.as_mut().ok_or(StackError::Closed)?;
        if self.offset == 0 {
            return Ok(None);
        }
        let (payload, start) = decode_backward(file, self.offset).map_err(|e| e.with_path(&self.path))?;

        self.fragments += self.offset - start;
        self.offset = start;
        self.records = self.records.saturating_sub(1);

        if should_compact(self.fragments, self.config.fragments_threshold) {
            if let Err(e) = self.run_compaction() {
                warn!(
                    path = %self.path.display(),
                    offset = self.offset,
                    fragments = self.fragments,
                    "compaction after pop failed: {}", e
                );
                return Err(e);
            }
        }

        Ok(Some(payload))
    }

    /// Truncate the file to the logical end now, whatever the threshold.
    pub fn compact(&mut self) -> StackResult<CompactionResult> {
        self.run_compaction()
    }

    fn run_compaction(&mut self) -> StackResult<CompactionResult> {
        let file = self.file.as_ref().ok_or(StackError::Closed)?;
        let result = compact(file, &self.path, self.offset)?;
        self.fragments = 0;
        debug!(
            path = %self.path.display(),
            offset = self.offset,
            bytes_saved = result.bytes_saved(),
            "compacted stack"
        );
        Ok(result)
    }

    /// Drop every record and truncate the file to zero. Idempotent.
    pub fn clear(&mut self) -> StackResult<()> {
        let file = self.file.as_ref().ok_or(StackError::Closed)?;
        file.set_len(0)
            .map_err(|e| StackError::io(&self.path, e, "Failed to truncate stack file"))?;
        durable_sync(file).map_err(|e| StackError::io(&self.path, e, "Failed to sync cleared file"))?;

        info!(path = %self.path.display(), records = self.records, "cleared stack");
        self.offset = 0;
        self.fragments = 0;
        self.records = 0;
        Ok(())
    }

    /// Flush everything written so far to persistent storage.
    pub fn sync(&self) -> StackResult<()> {
        let file = self.file.as_ref().ok_or(StackError::Closed)?;
        durable_sync(file).map_err(|e| StackError::io(&self.path, e, "Failed to sync stack file"))
    }

    /// Compact outstanding fragments, sync and release the file handle.
    ///
    /// The handle is released even when the final compaction or sync fails.
    /// Calling `close` again is a no-op; any other call returns `Closed`.
    pub fn close(&mut self) -> StackResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let result = if self.fragments > 0 {
            compact(&file, &self.path, self.offset).map(|r| {
                self.fragments = 0;
                debug!(path = %self.path.display(), bytes_saved = r.bytes_saved(), "compacted on close");
            })
        } else {
            durable_sync(&file).map_err(|e| StackError::io(&self.path, e, "Failed to sync on close"))
        };

        drop(file);
        debug!(path = %self.path.display(), offset = self.offset, "closed stack");
        result
    }

    /// Number of records on the stack.
    pub fn len(&self) -> u64 {
        self.records
    }

    /// True when the stack holds no records.
    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Logical end of valid data in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Popped bytes still physically present past `offset`.
    pub fn fragments(&self) -> u64 {
        self.fragments
    }

    /// Physical size of the backing file.
    pub fn file_len(&self) -> StackResult<u64> {
        let file = self.file.as_ref().ok_or(StackError::Closed)?;
        Ok(file
            .metadata()
            .map_err(|e| StackError::io(&self.path, e, "Failed to stat stack file"))?
            .len())
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True after `close`.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for DiskStack {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), "close on drop failed: {}", e);
        }
    }
}
