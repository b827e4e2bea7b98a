//! Fast mutex coordinator
//!
//! Lamport-style fast mutex built from two flags per lock, X and Y, stored in a
//! shared `RecordStore` that offers no atomic read-modify-write. Contenders never
//! talk to each other directly; they only observe each other's writes.
//!
//! Control is yielded back to the scheduler between every store write and the
//! following read so that other contenders get a chance to interleave their own
//! steps. The protocol depends on those interleavings, so the yields must stay.
//!
//! A single `FastMutex` drives one acquisition at a time (`lock` and `release`
//! take `&mut self`). Acquiring the same key twice on one instance before
//! releasing it is a caller error.

use std::sync::Arc;
use std::time::Duration;

use fastmutex_common::{
    CONTENTION_GRACE_MS, Clock, FastMutexError, Result, SystemClock, flag_key, random_client_id,
};
use tokio::task::yield_now;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

use super::model::{AcquireStep, LockStats};
use crate::config::FastMutexConfig;
use crate::metrics;
use crate::store::{ExpiringRecordStore, FileKeyValueStore, RecordStore};

/// Whole milliseconds of `d`, saturating at `u64::MAX`
fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Lock coordinator for one client identity
pub struct FastMutex {
    client_id: String,
    x_prefix: String,
    y_prefix: String,
    timeout: Duration,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    stats: LockStats,
}

impl FastMutex {
    pub fn builder() -> FastMutexBuilder {
        FastMutexBuilder::default()
    }

    /// Coordinator with default settings over the given store
    pub fn with_store(store: Arc<dyn RecordStore>) -> Self {
        Self::builder().store(store).build()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_ms(&self) -> u64 {
        duration_millis(self.timeout)
    }

    /// Statistics of the current (or last failed) acquisition
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Acquire the lock named `key`
    ///
    /// Suspends until the lock is held and returns the acquisition statistics.
    /// Fails with `AcquisitionTimeout` once the time since this call reaches the
    /// configured timeout, measured across all restarts. Store failures are
    /// returned unchanged and never retried.
    pub async fn lock(&mut self, key: &str) -> Result<LockStats> {
        debug!(
            %key,
            client_id = %self.client_id,
            "Attempting to acquire lock"
        );
        self.stats.begin_acquire(self.clock.now_millis());

        let result = self.run_steps(key).await;
        if let Err(FastMutexError::Store(e)) = &result {
            self.stats.finish_acquire(self.clock.now_millis());
            metrics::record_store_failure(&self.stats);
            warn!(
                %key,
                client_id = %self.client_id,
                error = %e,
                restarts = self.stats.restart_count,
                "Lock attempt aborted by store failure"
            );
        }
        result
    }

    /// Drive the acquisition state machine until the lock is held or the
    /// attempt fails
    async fn run_steps(&mut self, key: &str) -> Result<LockStats> {
        let x = flag_key(&self.x_prefix, key);
        let y = flag_key(&self.y_prefix, key);
        let timeout_ms = self.timeout_ms();
        let started = Instant::now();
        let mut step = AcquireStep::WriteX;

        loop {
            trace!(%key, client_id = %self.client_id, %step, "Lock step");
            step = match step {
                AcquireStep::WriteX => {
                    if started.elapsed() >= self.timeout {
                        self.stats.finish_acquire(self.clock.now_millis());
                        metrics::record_timeout(&self.stats);
                        warn!(
                            %key,
                            client_id = %self.client_id,
                            timeout_ms,
                            restarts = self.stats.restart_count,
                            "Lock could not be acquired within timeout"
                        );
                        return Err(FastMutexError::AcquisitionTimeout {
                            key: key.to_string(),
                            timeout_ms,
                        });
                    }

                    self.store.put(&x, &self.client_id, timeout_ms).await?;
                    yield_now().await;
                    AcquireStep::CheckY
                }
                AcquireStep::CheckY => {
                    // Someone else holds or is claiming Y
                    if let Some(owner) = self.store.get(&y, timeout_ms).await? {
                        debug!(%key, %owner, "Lock exists on Y, restarting");
                        self.stats.restart_count += 1;
                        yield_now().await;
                        AcquireStep::WriteX
                    } else {
                        yield_now().await;
                        AcquireStep::WriteY
                    }
                }
                AcquireStep::WriteY => {
                    self.store.put(&y, &self.client_id, timeout_ms).await?;
                    yield_now().await;
                    AcquireStep::CheckX
                }
                AcquireStep::CheckX => {
                    let owner = self.store.get(&x, timeout_ms).await?;
                    if owner.as_deref() == Some(self.client_id.as_str()) {
                        debug!(
                            %key,
                            client_id = %self.client_id,
                            "Acquired lock with no contention"
                        );
                        return Ok(self.acquired());
                    }

                    self.stats.contention_count += 1;
                    debug!(%key, x = ?owner, "Lock contention detected");
                    AcquireStep::ContentionWait
                }
                AcquireStep::ContentionWait => {
                    sleep(Duration::from_millis(CONTENTION_GRACE_MS)).await;
                    AcquireStep::RecheckY
                }
                AcquireStep::RecheckY => {
                    let owner = self.store.get(&y, timeout_ms).await?;
                    if owner.as_deref() == Some(self.client_id.as_str()) {
                        debug!(
                            %key,
                            client_id = %self.client_id,
                            "Won the lock contention"
                        );
                        return Ok(self.acquired());
                    }

                    self.stats.restart_count += 1;
                    self.stats.locks_lost += 1;
                    debug!(
                        %key,
                        client_id = %self.client_id,
                        winner = ?owner,
                        "Lost the lock contention, restarting"
                    );
                    yield_now().await;
                    AcquireStep::WriteX
                }
            };
        }
    }

    fn acquired(&mut self) -> LockStats {
        self.stats.mark_acquired(self.clock.now_millis());
        metrics::record_acquired(&self.stats);
        self.stats.clone()
    }

    /// Release the lock named `key`
    ///
    /// Clears the Y flag and returns the finished statistics, then resets them.
    /// Releasing a lock that was never acquired succeeds with zero durations.
    pub async fn release(&mut self, key: &str) -> Result<LockStats> {
        debug!(%key, client_id = %self.client_id, "Releasing lock");
        let y = flag_key(&self.y_prefix, key);
        self.store.remove(&y).await?;

        self.stats.mark_released(self.clock.now_millis());
        metrics::record_released(&self.stats);
        let stats = self.stats.clone();
        self.stats.reset();
        Ok(stats)
    }
}

/// Builder for `FastMutex`
///
/// Unset fields fall back to: a random client identity, the default flag
/// prefixes, a 5000ms timeout, the system clock, and the file store under
/// the system temp directory.
#[derive(Default)]
pub struct FastMutexBuilder {
    config: FastMutexConfig,
    store: Option<Arc<dyn RecordStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl FastMutexBuilder {
    pub fn from_config(config: FastMutexConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    pub fn x_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.x_prefix = prefix.into();
        self
    }

    pub fn y_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.y_prefix = prefix.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = duration_millis(timeout);
        self
    }

    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> FastMutex {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.unwrap_or_else(|| {
            Arc::new(ExpiringRecordStore::with_clock(
                FileKeyValueStore::default(),
                clock.clone(),
            ))
        });

        FastMutex {
            client_id: self.config.client_id.unwrap_or_else(random_client_id),
            x_prefix: self.config.x_prefix,
            y_prefix: self.config.y_prefix,
            timeout: Duration::from_millis(self.config.timeout_ms),
            store,
            clock,
            stats: LockStats::default(),
        }
    }
}
