// Multi-process run
//
// Every participant process computes the same quarter-minute boundary, resets
// the shared counter, waits for the boundary, then increments the counter once
// under the lock. Participants announce themselves with `started` and
// `completed` markers so each one can tell when the run is over.

use std::time::Duration;

use fastmutex_common::current_timestamp;
use fastmutex_core::FastMutexConfig;
use rand::Rng;
use tracing::{debug, error, info, warn};

use super::SharedStore;
use super::race::increment_under_lock;
use super::report::{RunReport, format_timestamp};
use crate::config::RunArgs;
use crate::metrics;

const RUN_INTERVAL_SECS: i64 = 15;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LINGER: Duration = Duration::from_secs(2);

const STARTED: &str = "started";
const COMPLETED: &str = "completed";

/// Epoch milliseconds of the next :00/:15/:30/:45 second boundary after `now_ms`
pub fn next_run_start(now_ms: i64) -> i64 {
    let secs = now_ms.div_euclid(1000);
    (secs / RUN_INTERVAL_SECS + 1) * RUN_INTERVAL_SECS * 1000
}

fn counter_key(run_id: i64) -> String {
    format!("{}-counter", run_id)
}

fn participant_prefix(run_id: i64) -> String {
    format!("{}-participant-", run_id)
}

/// One participant of a multi-process run
pub struct Participant {
    store: SharedStore,
    config: FastMutexConfig,
    key: String,
    tag: String,
    hold: Duration,
    settle_timeout: Duration,
    linger: Duration,
}

impl Participant {
    pub fn new(store: SharedStore, config: FastMutexConfig, args: &RunArgs) -> Self {
        let tag = format!("participant-{}", rand::rng().random_range(0..10_000u32));
        Self {
            store,
            config,
            key: args.key.clone(),
            tag,
            hold: Duration::from_millis(args.hold_ms),
            settle_timeout: Duration::from_secs(args.settle_timeout_secs),
            linger: LINGER,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn participant_key(&self, run_id: i64) -> String {
        format!("{}{}", participant_prefix(run_id), self.tag)
    }

    /// Take part in the run starting at `run_id` (epoch milliseconds)
    pub async fn run_once(&self, run_id: i64) -> anyhow::Result<RunReport> {
        let counter = counter_key(run_id);
        let marker = self.participant_key(run_id);

        info!(tag = %self.tag, run = %format_timestamp(run_id), "Scheduling run");
        self.store.write_counter(&counter, 0).await?;

        let wait = run_id - current_timestamp();
        if wait > 0 {
            tokio::time::sleep(Duration::from_millis(wait as u64)).await;
        }

        self.store.raw.set_item(&marker, STARTED).await?;
        let mut mutex = self.store.mutex(&self.config);
        match increment_under_lock(&mut mutex, &self.store, &self.key, &counter, self.hold).await {
            Ok(stats) => info!(
                tag = %self.tag,
                acquire_ms = stats.acquire_duration,
                hold_ms = stats.lock_duration,
                restarts = stats.restart_count,
                contentions = stats.contention_count,
                lost = stats.locks_lost,
                "Incremented counter under lock"
            ),
            Err(e) => error!(tag = %self.tag, error = %e, "Failed to increment counter"),
        }
        self.store.raw.set_item(&marker, COMPLETED).await?;

        let report = self.settle(run_id).await?;

        tokio::time::sleep(self.linger).await;
        self.cleanup(run_id).await?;
        Ok(report)
    }

    /// Wait until every announced participant has completed
    async fn settle(&self, run_id: i64) -> anyhow::Result<RunReport> {
        let started = tokio::time::Instant::now();
        loop {
            let (participants, completed) = self.participant_counts(run_id).await?;
            if completed == participants || started.elapsed() >= self.settle_timeout {
                if completed < participants {
                    warn!(
                        tag = %self.tag,
                        participants,
                        completed,
                        "Gave up waiting for participants"
                    );
                }
                return Ok(RunReport {
                    run_id,
                    participants,
                    completed,
                    counter: self.store.read_counter(&counter_key(run_id)).await?,
                });
            }
            debug!(participants, completed, "Waiting for participants");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn participant_counts(&self, run_id: i64) -> anyhow::Result<(usize, usize)> {
        let keys = self
            .store
            .raw
            .keys_with_prefix(&participant_prefix(run_id))
            .await?;
        let mut completed = 0;
        for key in &keys {
            if self.store.raw.get_item(key).await?.as_deref() == Some(COMPLETED) {
                completed += 1;
            }
        }
        Ok((keys.len(), completed))
    }

    async fn cleanup(&self, run_id: i64) -> anyhow::Result<()> {
        self.store.raw.remove_item(&counter_key(run_id)).await?;
        for key in self
            .store
            .raw
            .keys_with_prefix(&participant_prefix(run_id))
            .await?
        {
            self.store.raw.remove_item(&key).await?;
        }
        Ok(())
    }
}

/// Take part in `args.runs` consecutive runs (forever when 0)
///
/// Returns whether every run passed.
pub async fn run_participant(
    store: &SharedStore,
    config: &FastMutexConfig,
    args: &RunArgs,
) -> anyhow::Result<bool> {
    let participant = Participant::new(store.clone(), config.clone(), args);
    info!(tag = %participant.tag(), runs = args.runs, "Joining runs");

    let mut all_passed = true;
    let mut done = 0u32;
    while args.runs == 0 || done < args.runs {
        let run_id = next_run_start(current_timestamp());
        let report = participant.run_once(run_id).await?;
        metrics::record_verdict(report.passed());
        if report.passed() {
            info!(tag = %participant.tag(), "{}", report);
        } else {
            error!(tag = %participant.tag(), "{}", report);
        }
        println!("{}", report);
        all_passed &= report.passed();
        done += 1;
    }
    Ok(all_passed)
}
