// Harness metrics
// Installs a Prometheus recorder so lock metrics can be printed after a run

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const HARNESS_RUNS_TOTAL: &str = "fastmutex_harness_runs_total";

/// Install the global Prometheus recorder when enabled
///
/// Returns `None` when metrics are disabled; recording calls are then no-ops.
pub fn init_metrics(enabled: bool) -> anyhow::Result<Option<PrometheusHandle>> {
    if !enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    fastmutex_core::metrics::describe_metrics();
    describe_counter!(HARNESS_RUNS_TOTAL, "Total number of harness runs by verdict");
    Ok(Some(handle))
}

pub fn record_verdict(passed: bool) {
    let verdict = if passed { "pass" } else { "fail" };
    counter!(HARNESS_RUNS_TOTAL, "verdict" => verdict).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_install_nothing() {
        assert!(init_metrics(false).unwrap().is_none());
        // No recorder installed; recording must still be safe
        record_verdict(true);
    }
}
