//! DiskStack — Durable Single-File LIFO Stack
//!
//! A stack of opaque byte payloads kept in one append-only file. Push and pop
//! cost the same regardless of stack depth, and a reopened file recovers its
//! contents by reading nothing but the file itself.
//!
//! # Architecture
//!
//! - **Record format**: `[len: u32][payload][extent: u64]`; the trailer is a
//!   backward link to the start of the record
//! - **Engine**: tracks the logical end and the bytes popped past it
//! - **Compaction**: truncates popped bytes once they reach a threshold,
//!   synchronously inside `pop`
//!
//! # Example
//!
//! ```no_run
//! use diskstack::{Config, DiskStack};
//!
//! # fn main() -> diskstack::StackResult<()> {
//! let mut stack = DiskStack::open("undo.log", Config::batched(64 * 1024))?;
//! stack.put(b"edit 1")?;
//! stack.put(b"edit 2")?;
//! assert_eq!(stack.pop()?, Some(b"edit 2".to_vec()));
//! stack.close()?;
//! # Ok(())
//! # }
//! ```

pub mod compaction;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod platform_durability;
pub mod recovery;
pub mod shared;

// Re-export key types for convenience
pub use compaction::CompactionResult;
pub use config::{Config, RecoveryPolicy, MAX_PAYLOAD_SIZE};
pub use engine::DiskStack;
pub use error::{StackError, StackResult};
pub use shared::SharedStack;
