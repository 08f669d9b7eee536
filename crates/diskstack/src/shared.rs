//! Thread-safe wrapper around `DiskStack`.
//!
//! Every stack operation reads and then writes the `{file, offset, fragments}`
//! triple, so concurrent callers must be serialized. `SharedStack` does that
//! with a single mutex around the whole engine; each call holds it for the
//! duration of its I/O, including the fsync in `put`.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::compaction::CompactionResult;
use crate::config::Config;
use crate::engine::DiskStack;
use crate::error::StackResult;

/// `DiskStack` behind a mutex; share it with `Arc<SharedStack>`.
#[derive(Debug)]
pub struct SharedStack {
    inner: Mutex<DiskStack>,
    path: PathBuf,
}

impl SharedStack {
    /// Open or create a stack file; see `DiskStack::open`.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StackResult<Self> {
        Ok(Self::new(DiskStack::open(path, config)?))
    }

    /// Take ownership of an already open engine.
    pub fn new(stack: DiskStack) -> Self {
        let path = stack.path().to_path_buf();
        Self { inner: Mutex::new(stack), path }
    }

    /// See `DiskStack::put`.
    pub fn put(&self, payload: &[u8]) -> StackResult<()> {
        self.inner.lock().put(payload)
    }

    /// See `DiskStack::put_fast`.
    pub fn put_fast(&self, payload: &[u8]) -> StackResult<()> {
        self.inner.lock().put_fast(payload)
    }

    /// See `DiskStack::top`.
    pub fn top(&self) -> StackResult<Option<Vec<u8>>> {
        self.inner.lock().top()
    }

    /// See `DiskStack::pop`.
    pub fn pop(&self) -> StackResult<Option<Vec<u8>>> {
        self.inner.lock().pop()
    }

    /// See `DiskStack::clear`.
    pub fn clear(&self) -> StackResult<()> {
        self.inner.lock().clear()
    }

    /// See `DiskStack::compact`.
    pub fn compact(&self) -> StackResult<CompactionResult> {
        self.inner.lock().compact()
    }

    /// See `DiskStack::sync`.
    pub fn sync(&self) -> StackResult<()> {
        self.inner.lock().sync()
    }

    /// Close the engine; later calls return `StackError::Closed`.
    pub fn close(&self) -> StackResult<()> {
        self.inner.lock().close()
    }

    /// Number of records on the stack.
    pub fn len(&self) -> u64 {
        self.inner.lock().len()
    }

    /// True when the stack holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run several operations under one lock acquisition.
    pub fn with<R>(&self, f: impl FnOnce(&mut DiskStack) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }

    /// Unwrap the engine.
    pub fn into_inner(self) -> DiskStack {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackError;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_concurrent_puts_then_drain() {
        let dir = TempDir::new().unwrap();
        let stack = Arc::new(SharedStack::open(dir.path().join("stack.db"), Config::default()).unwrap());

        let mut handles = vec![];
        for t in 0..4u8 {
            let s = Arc::clone(&stack);
            handles.push(std::thread::spawn(move || {
                for i in 0..25u8 {
                    s.put(&[t, i]).unwrap();
                }
            }));
        }
        for h in handles { h.join().unwrap(); }

        assert_eq!(stack.len(), 100);

        let mut seen = HashSet::new();
        while let Some(p) = stack.pop().unwrap() {
            assert!(seen.insert(p));
        }
        assert_eq!(seen.len(), 100);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_with_runs_atomically() {
        let dir = TempDir::new().unwrap();
        let stack = SharedStack::open(dir.path().join("stack.db"), Config::default()).unwrap();
        stack.put(b"a").unwrap();

        // Swap the top two records under one lock
        stack.put(b"b").unwrap();
        stack.with(|s| {
            let b = s.pop().unwrap().unwrap();
            let a = s.pop().unwrap().unwrap();
            s.put(&b).unwrap();
            s.put(&a).unwrap();
        });

        assert_eq!(stack.pop().unwrap(), Some(b"a".to_vec()));
        assert_eq!(stack.pop().unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_close_propagates() {
        let dir = TempDir::new().unwrap();
        let stack = SharedStack::open(dir.path().join("stack.db"), Config::default()).unwrap();
        stack.close().unwrap();
        assert!(matches!(stack.top(), Err(StackError::Closed)));
        assert!(stack.into_inner().is_closed());
    }
}
