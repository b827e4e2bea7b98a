// Metrics emitted by the lock coordinator
// Recorded through the `metrics` facade; a binary decides whether to install an exporter

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::lock::LockStats;

pub const LOCK_ACQUIRED_TOTAL: &str = "fastmutex_lock_acquired_total";
pub const LOCK_TIMEOUTS_TOTAL: &str = "fastmutex_lock_timeouts_total";
pub const LOCK_RESTARTS_TOTAL: &str = "fastmutex_lock_restarts_total";
pub const LOCK_CONTENTIONS_TOTAL: &str = "fastmutex_lock_contentions_total";
pub const LOCKS_LOST_TOTAL: &str = "fastmutex_locks_lost_total";
pub const LOCK_ACQUIRE_DURATION_SECONDS: &str = "fastmutex_lock_acquire_duration_seconds";
pub const LOCK_HOLD_DURATION_SECONDS: &str = "fastmutex_lock_hold_duration_seconds";

/// Register metric descriptions
/// Should be called once after the recorder is installed
pub fn describe_metrics() {
    describe_counter!(LOCK_ACQUIRED_TOTAL, "Total number of successful lock acquisitions");
    describe_counter!(
        LOCK_TIMEOUTS_TOTAL,
        "Total number of acquisitions that gave up after the timeout"
    );
    describe_counter!(
        LOCK_RESTARTS_TOTAL,
        "Total number of times an acquisition restarted from the X write"
    );
    describe_counter!(
        LOCK_CONTENTIONS_TOTAL,
        "Total number of contention events detected on the X flag"
    );
    describe_counter!(LOCKS_LOST_TOTAL, "Total number of contended races lost");
    describe_histogram!(
        LOCK_ACQUIRE_DURATION_SECONDS,
        "Time from lock() call to acquisition in seconds"
    );
    describe_histogram!(LOCK_HOLD_DURATION_SECONDS, "Time the lock was held in seconds");
}

fn record_races(stats: &LockStats) {
    counter!(LOCK_RESTARTS_TOTAL).increment(stats.restart_count as u64);
    counter!(LOCK_CONTENTIONS_TOTAL).increment(stats.contention_count as u64);
    counter!(LOCKS_LOST_TOTAL).increment(stats.locks_lost as u64);
}

pub(crate) fn record_acquired(stats: &LockStats) {
    counter!(LOCK_ACQUIRED_TOTAL).increment(1);
    histogram!(LOCK_ACQUIRE_DURATION_SECONDS).record(stats.acquire_duration as f64 / 1000.0);
    record_races(stats);
}

pub(crate) fn record_timeout(stats: &LockStats) {
    counter!(LOCK_TIMEOUTS_TOTAL).increment(1);
    record_races(stats);
}

pub(crate) fn record_store_failure(stats: &LockStats) {
    record_races(stats);
}

pub(crate) fn record_released(stats: &LockStats) {
    if stats.lock_start.is_some() {
        histogram!(LOCK_HOLD_DURATION_SECONDS).record(stats.lock_duration as f64 / 1000.0);
    }
}
