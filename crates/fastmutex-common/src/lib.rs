//! fastmutex Common - Shared types, errors, and utilities
//!
//! This crate provides the foundational pieces used across all fastmutex components:
//! - Error types for lock acquisition and store access
//! - Clock abstraction used for record expiry and lock statistics
//! - Client identity generation
//! - Storage key defaults and protocol constants

pub mod clock;
pub mod error;
pub mod utils;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FastMutexError, Result, StoreError};
pub use utils::{current_timestamp, random_client_id};

/// Default namespace prefix for the "X" flag of every lock
pub const DEFAULT_X_PREFIX: &str = "_MUTEX_LOCK_X_";

/// Default namespace prefix for the "Y" flag of every lock
pub const DEFAULT_Y_PREFIX: &str = "_MUTEX_LOCK_Y_";

/// Default acquisition timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Grace period, in milliseconds, granted to a competing contender after
/// contention on the X flag has been detected
pub const CONTENTION_GRACE_MS: u64 = 50;

/// Derive the storage key of a lock flag from its prefix and the lock name
pub fn flag_key(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_key() {
        assert_eq!(flag_key(DEFAULT_X_PREFIX, "the-lock"), "_MUTEX_LOCK_X_the-lock");
        assert_eq!(flag_key(DEFAULT_Y_PREFIX, "the-lock"), "_MUTEX_LOCK_Y_the-lock");
        assert_eq!(flag_key("", "k"), "k");
    }
}
