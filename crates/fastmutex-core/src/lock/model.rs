//! Lock statistics and acquisition states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of one acquisition attempt
///
/// ```text
/// WriteX -> CheckY -> WriteY -> CheckX -> Acquired
///              |                  |
///              +-> WriteX         +-> ContentionWait -> RecheckY -> Acquired
///                  (restart)                               |
///                                                          +-> WriteX (lost, restart)
/// ```
///
/// The timeout guard runs on every entry to `WriteX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStep {
    /// Announce intent by writing our identity to X
    WriteX,
    /// Back off if anyone holds Y
    CheckY,
    /// Claim the lock by writing our identity to Y
    WriteY,
    /// Confirm nobody overwrote X since our write
    CheckX,
    /// Someone overwrote X; give them time to finish their own Y write
    ContentionWait,
    /// Decide the contended race by re-reading Y
    RecheckY,
}

impl AcquireStep {
    pub fn as_str(self) -> &'static str {
        match self {
            AcquireStep::WriteX => "write_x",
            AcquireStep::CheckY => "check_y",
            AcquireStep::WriteY => "write_y",
            AcquireStep::CheckX => "check_x",
            AcquireStep::ContentionWait => "contention_wait",
            AcquireStep::RecheckY => "recheck_y",
        }
    }
}

impl fmt::Display for AcquireStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics for one lock lifecycle
///
/// Timestamps are Unix milliseconds, durations are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStats {
    /// Times the attempt looped back to `WriteX`
    pub restart_count: u32,
    /// Contended races that resolved in favour of another identity
    pub locks_lost: u32,
    /// Times X changed between our Y write and our X re-check
    pub contention_count: u32,
    pub acquire_start: Option<i64>,
    pub acquire_end: Option<i64>,
    pub acquire_duration: u64,
    pub lock_start: Option<i64>,
    pub lock_end: Option<i64>,
    pub lock_duration: u64,
}

impl LockStats {
    /// Zero every counter and clear every timestamp
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn begin_acquire(&mut self, now: i64) {
        self.reset();
        self.acquire_start = Some(now);
    }

    pub(crate) fn finish_acquire(&mut self, now: i64) {
        self.acquire_end = Some(now);
        self.acquire_duration = elapsed_since(self.acquire_start, now);
    }

    pub(crate) fn mark_acquired(&mut self, now: i64) {
        self.finish_acquire(now);
        self.lock_start = Some(now);
    }

    pub(crate) fn mark_released(&mut self, now: i64) {
        self.lock_end = Some(now);
        self.lock_duration = elapsed_since(self.lock_start, now);
    }

    /// Whether this acquisition had to resolve at least one race
    pub fn was_contended(&self) -> bool {
        self.contention_count > 0
    }
}

fn elapsed_since(start: Option<i64>, now: i64) -> u64 {
    start.map(|s| now.saturating_sub(s).max(0) as u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_then_release_durations() {
        let mut stats = LockStats::default();
        stats.begin_acquire(1_000);
        stats.restart_count = 2;
        stats.mark_acquired(1_040);

        assert_eq!(stats.acquire_start, Some(1_000));
        assert_eq!(stats.acquire_end, Some(1_040));
        assert_eq!(stats.acquire_duration, 40);
        assert_eq!(stats.lock_start, Some(1_040));

        stats.mark_released(1_100);
        assert_eq!(stats.lock_end, Some(1_100));
        assert_eq!(stats.lock_duration, 60);
        assert_eq!(stats.restart_count, 2);
    }

    #[test]
    fn test_release_without_acquire_has_zero_duration() {
        let mut stats = LockStats::default();
        stats.mark_released(5_000);
        assert_eq!(stats.lock_duration, 0);
        assert_eq!(stats.lock_end, Some(5_000));
    }

    #[test]
    fn test_begin_acquire_resets_counters() {
        let mut stats = LockStats {
            restart_count: 3,
            locks_lost: 1,
            contention_count: 1,
            lock_start: Some(1),
            ..Default::default()
        };
        stats.begin_acquire(10);

        assert_eq!(
            stats,
            LockStats {
                acquire_start: Some(10),
                ..Default::default()
            }
        );
        assert!(!stats.was_contended());
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = LockStats {
            restart_count: 1,
            locks_lost: 1,
            contention_count: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["restartCount"], 1);
        assert_eq!(json["locksLost"], 1);
        assert_eq!(json["contentionCount"], 1);
        assert!(json["acquireStart"].is_null());
    }

    #[test]
    fn test_step_names() {
        assert_eq!(AcquireStep::WriteX.to_string(), "write_x");
        assert_eq!(AcquireStep::ContentionWait.as_str(), "contention_wait");
    }
}
