//! Configuration for DiskStack
//!
//! The only option the on-disk format cares about is the fragments
//! threshold; the rest tune durability and recovery behaviour.

use crate::error::{StackError, StackResult};

/// Largest payload representable by the 4-byte length prefix.
pub const MAX_PAYLOAD_SIZE: u64 = u32::MAX as u64;

/// What `open` does when the recovery scan finds an incomplete tail record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Discard the torn record, truncate the file to the last complete
    /// record and open normally.
    #[default]
    TruncateTorn,
    /// Refuse to open; the torn record is reported as `StackError::Corrupted`
    /// and the file is left untouched.
    Strict,
}

/// DiskStack configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Compact once at least this many popped bytes sit past the logical end.
    /// Zero compacts on every pop.
    pub fragments_threshold: u64,
    /// Torn-tail handling during `open`
    pub recovery: RecoveryPolicy,
    /// fsync after every `put`. `put_fast` ignores this and never syncs.
    pub sync_on_put: bool,
    /// Largest payload `put` accepts, at most `MAX_PAYLOAD_SIZE`
    pub max_payload_size: u64,
}

impl Config {
    /// Truncate on every pop.
    pub fn eager() -> Self {
        Self {
            fragments_threshold: 0,
            recovery: RecoveryPolicy::TruncateTorn,
            sync_on_put: true,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }

    /// Let up to `threshold` bytes of popped records accumulate before
    /// truncating.
    pub fn batched(threshold: u64) -> Self {
        Self { fragments_threshold: threshold, ..Self::eager() }
    }

    /// Builder-style override of the recovery policy.
    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StackResult<()> {
        if self.max_payload_size == 0 {
            return Err(StackError::InvalidConfig("max_payload_size must be > 0".into()));
        }
        if self.max_payload_size > MAX_PAYLOAD_SIZE {
            return Err(StackError::InvalidConfig(format!(
                "max_payload_size must be <= {}",
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::eager() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_valid() {
        assert!(Config::eager().validate().is_ok());
        assert!(Config::batched(64).validate().is_ok());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_is_eager() {
        let c = Config::default();
        assert_eq!(c.fragments_threshold, 0);
        assert_eq!(c.recovery, RecoveryPolicy::TruncateTorn);
        assert!(c.sync_on_put);
        assert_eq!(c.max_payload_size, MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_batched_keeps_other_defaults() {
        let c = Config::batched(4096).with_recovery(RecoveryPolicy::Strict);
        assert_eq!(c.fragments_threshold, 4096);
        assert_eq!(c.recovery, RecoveryPolicy::Strict);
        assert!(c.sync_on_put);
    }

    #[test]
    fn test_invalid_payload_cap() {
        let mut c = Config::default();
        c.max_payload_size = 0;
        assert!(matches!(c.validate(), Err(StackError::InvalidConfig(_))));

        c.max_payload_size = MAX_PAYLOAD_SIZE + 1;
        assert!(matches!(c.validate(), Err(StackError::InvalidConfig(_))));
    }
}
