//! Integration tests for the contention harness
//!
//! Drives races end to end through the public harness API.

use fastmutex_core::FastMutexConfig;
use fastmutex_harness::config::{RaceArgs, StoreConfig, StoreKind};
use fastmutex_harness::harness::{SharedStore, open_store, run_race};

fn race_args(contenders: usize, hold_ms: u64) -> RaceArgs {
    RaceArgs {
        contenders,
        hold_ms,
        key: "the-lock".to_string(),
    }
}

// ============================================================================
// Memory store
// ============================================================================

#[tokio::test]
async fn test_race_default_shape_passes() {
    let store = SharedStore::memory();
    let report = run_race(&store, &FastMutexConfig::default(), &race_args(5, 35))
        .await
        .unwrap();

    assert!(report.passed(), "{}", report);
    assert_eq!(report.contenders.len(), 5);
    assert!(report.contenders.iter().all(|c| c.stats.is_some()));
}

#[tokio::test]
async fn test_race_many_contenders_records_contention() {
    let store = SharedStore::memory();
    let config = FastMutexConfig {
        timeout_ms: 20_000,
        ..Default::default()
    };
    let report = run_race(&store, &config, &race_args(12, 2)).await.unwrap();

    assert!(report.passed(), "{}", report);
    let restarts: u32 = report
        .contenders
        .iter()
        .filter_map(|c| c.stats.as_ref())
        .map(|s| s.restart_count)
        .sum();
    assert!(restarts > 0);
}

#[tokio::test]
async fn test_back_to_back_races_on_one_store() {
    let store = SharedStore::memory();
    let config = FastMutexConfig::default();

    for _ in 0..3 {
        let report = run_race(&store, &config, &race_args(3, 5)).await.unwrap();
        assert!(report.passed(), "{}", report);
        assert_eq!(report.counter, 3);
    }
}

// ============================================================================
// File store
// ============================================================================

#[tokio::test]
async fn test_single_contender_race_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&StoreConfig {
        kind: StoreKind::File,
        dir: dir.path().to_path_buf(),
    });

    let report = run_race(&store, &FastMutexConfig::default(), &race_args(1, 5))
        .await
        .unwrap();

    assert!(report.passed(), "{}", report);
    assert_eq!(report.counter, 1);
}
