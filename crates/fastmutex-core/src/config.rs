// Lock coordinator configuration
// Every field has a default so partial config files and env overrides deserialize cleanly

use std::time::Duration;

use fastmutex_common::{DEFAULT_TIMEOUT_MS, DEFAULT_X_PREFIX, DEFAULT_Y_PREFIX};
use serde::{Deserialize, Serialize};

/// Configuration for a `FastMutex`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastMutexConfig {
    /// Client identity (default: a fresh random identity per instance)
    pub client_id: Option<String>,

    /// Namespace prefix of the X flag key (default: `_MUTEX_LOCK_X_`)
    pub x_prefix: String,

    /// Namespace prefix of the Y flag key (default: `_MUTEX_LOCK_Y_`)
    pub y_prefix: String,

    /// Acquisition timeout in milliseconds (default: 5000ms)
    /// Also the lifetime stamped on every stored flag
    pub timeout_ms: u64,
}

impl Default for FastMutexConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            x_prefix: DEFAULT_X_PREFIX.to_string(),
            y_prefix: DEFAULT_Y_PREFIX.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl FastMutexConfig {
    /// Get the acquisition timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
