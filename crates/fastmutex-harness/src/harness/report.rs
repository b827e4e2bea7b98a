// Human-readable harness results

use std::fmt;

use chrono::{Local, TimeZone};
use fastmutex_core::LockStats;
use serde::Serialize;

/// Render epoch milliseconds as local wall-clock time
pub fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%H:%M:%S%.3f").to_string(),
        None => millis.to_string(),
    }
}

/// Outcome of one contender in a race
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContenderReport {
    pub client_id: String,
    pub stats: Option<LockStats>,
    pub error: Option<String>,
}

impl fmt::Display for ContenderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.stats, &self.error) {
            (_, Some(error)) => write!(f, "{}: FAILED ({})", self.client_id, error),
            (Some(stats), None) => {
                write!(
                    f,
                    "{}: waited {}ms, held {}ms, restarts={} contentions={} lost={}",
                    self.client_id,
                    stats.acquire_duration,
                    stats.lock_duration,
                    stats.restart_count,
                    stats.contention_count,
                    stats.locks_lost
                )?;
                if let Some(start) = stats.acquire_start {
                    write!(f, " (started {})", format_timestamp(start))?;
                }
                Ok(())
            }
            (None, None) => write!(f, "{}: no result", self.client_id),
        }
    }
}

/// Outcome of an in-process race
#[derive(Debug, Clone, Serialize)]
pub struct RaceReport {
    pub contenders: Vec<ContenderReport>,
    pub counter: u64,
}

impl RaceReport {
    pub fn passed(&self) -> bool {
        self.counter == self.contenders.len() as u64
            && self.contenders.iter().all(|c| c.error.is_none())
    }
}

impl fmt::Display for RaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for contender in &self.contenders {
            writeln!(f, "  {}", contender)?;
        }
        write!(
            f,
            "{} - ({} contenders, counter was {})",
            verdict(self.passed()),
            self.contenders.len(),
            self.counter
        )
    }
}

/// Outcome of one multi-process run as seen by one participant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: i64,
    pub participants: usize,
    pub completed: usize,
    pub counter: u64,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.participants > 0
            && self.completed == self.participants
            && self.counter == self.participants as u64
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run {}: {} - ({} participants in run, counter was {})",
            format_timestamp(self.run_id),
            verdict(self.passed()),
            self.participants,
            self.counter
        )?;
        if self.completed < self.participants {
            write!(f, " [{} never completed]", self.participants - self.completed)?;
        }
        Ok(())
    }
}

fn verdict(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}
