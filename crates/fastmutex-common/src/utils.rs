//! Utility functions for fastmutex

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Generate a fresh client identity
///
/// Each call returns a new value; nothing is cached process-wide.
///
/// # Examples
///
/// ```
/// use fastmutex_common::random_client_id;
///
/// assert_ne!(random_client_id(), random_client_id());
/// ```
pub fn random_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
