// In-process race: N coordinators, one store, one counter

use std::time::Duration;

use fastmutex_common::FastMutexError;
use fastmutex_core::{FastMutex, FastMutexConfig, LockStats};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::SharedStore;
use super::report::{ContenderReport, RaceReport};
use crate::config::RaceArgs;

/// Counter key guarded by the lock `key`
pub(crate) fn counter_key(key: &str) -> String {
    format!("{}-counter", key)
}

/// Lock, read the counter, hold, write counter + 1, release
pub(crate) async fn increment_under_lock(
    mutex: &mut FastMutex,
    store: &SharedStore,
    key: &str,
    counter: &str,
    hold: Duration,
) -> Result<LockStats, FastMutexError> {
    let acquired = mutex.lock(key).await?;
    let value = store.read_counter(counter).await?;
    debug!(client_id = %mutex.client_id(), value, "Read counter inside lock");
    tokio::time::sleep(hold).await;
    store.write_counter(counter, value + 1).await?;
    let released = mutex.release(key).await?;

    Ok(LockStats {
        lock_start: released.lock_start,
        lock_end: released.lock_end,
        lock_duration: released.lock_duration,
        ..acquired
    })
}

/// Run `args.contenders` concurrent increments and report the final counter
pub async fn run_race(
    store: &SharedStore,
    config: &FastMutexConfig,
    args: &RaceArgs,
) -> anyhow::Result<RaceReport> {
    let counter = counter_key(&args.key);
    let hold = Duration::from_millis(args.hold_ms);
    store.write_counter(&counter, 0).await?;

    info!(
        contenders = args.contenders,
        hold_ms = args.hold_ms,
        key = %args.key,
        "Starting race"
    );

    let handles: Vec<_> = (0..args.contenders)
        .map(|i| {
            let mut config = config.clone();
            // Identities must be distinct, so a fixed one gets a per-contender suffix
            if let Some(id) = &config.client_id {
                config.client_id = Some(format!("{}-{}", id, i));
            }
            let mut mutex = store.mutex(&config);
            let store = store.clone();
            let key = args.key.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let result = increment_under_lock(&mut mutex, &store, &key, &counter, hold).await;
                (mutex.client_id().to_string(), result)
            })
        })
        .collect();

    let mut contenders = Vec::with_capacity(handles.len());
    for joined in join_all(handles).await {
        let (client_id, result) = joined?;
        contenders.push(match result {
            Ok(stats) => ContenderReport {
                client_id,
                stats: Some(stats),
                error: None,
            },
            Err(e) => {
                warn!(%client_id, error = %e, "Contender failed");
                ContenderReport {
                    client_id,
                    stats: None,
                    error: Some(e.to_string()),
                }
            }
        });
    }

    let report = RaceReport {
        contenders,
        counter: store.read_counter(&counter).await?,
    };
    store.raw.remove_item(&counter).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(contenders: usize) -> RaceArgs {
        RaceArgs {
            contenders,
            hold_ms: 5,
            key: "race-lock".to_string(),
        }
    }

    #[test]
    fn test_counter_key() {
        assert_eq!(counter_key("the-lock"), "the-lock-counter");
    }

    #[tokio::test]
    async fn test_race_passes_on_memory_store() {
        let store = SharedStore::memory();
        let report = run_race(&store, &FastMutexConfig::default(), &args(4))
            .await
            .unwrap();

        assert!(report.passed(), "{}", report);
        assert_eq!(report.counter, 4);
        // Counter cleaned up afterwards
        assert!(store.raw.get_item("race-lock-counter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fixed_client_id_is_suffixed() {
        let store = SharedStore::memory();
        let config = FastMutexConfig {
            client_id: Some("tab".to_string()),
            ..Default::default()
        };
        let report = run_race(&store, &config, &args(2)).await.unwrap();

        let mut ids: Vec<_> = report.contenders.iter().map(|c| c.client_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["tab-0", "tab-1"]);
        assert!(report.passed(), "{}", report);
    }

    #[tokio::test]
    async fn test_timeouts_fail_the_race() {
        let store = SharedStore::memory();
        // Y held by someone who never lets go
        store
            .records
            .put("_MUTEX_LOCK_Y_race-lock", "ghost", 60_000)
            .await
            .unwrap();
        let config = FastMutexConfig {
            timeout_ms: 100,
            ..Default::default()
        };

        let report = run_race(&store, &config, &args(2)).await.unwrap();
        assert!(!report.passed());
        assert_eq!(report.counter, 0);
        assert!(report.contenders.iter().all(|c| c.error.is_some()));
    }
}
