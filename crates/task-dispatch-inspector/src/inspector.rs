//! Liveness reconciliation. From here a worker moves through
//! Unknown → Alive (fresh heartbeat) → Stale (TTL exceeded) → Reaped
//! (in-flight relocated, heartbeat entry removed).

use crate::config::InspectorConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use task_dispatch_core::{Heartbeat, KeySpace};
use task_dispatch_store::{Store, StoreError};

/// What one reconciliation pass did and saw.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub reaped_workers: usize,
    pub orphaned_lists: usize,
    pub relocated: usize,
    pub malformed_entries: usize,
    pub backlog: u64,
    pub backlog_alert: bool,
}

struct ShutdownState {
    notify: Notify,
    stopping: AtomicBool,
}

/// Requests a graceful stop after the scan in progress finishes.
#[derive(Clone)]
pub struct ShutdownHandle {
    state: Arc<ShutdownState>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.state.stopping.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }
}

/// Periodic scanner that returns dead workers' claimed-but-unfinished
/// tasks to the shared queue and reports backlog.
///
/// A worker that resumes beating after going stale but before being
/// reaped can see its tasks relocated while it still runs them. That
/// duplicate execution is accepted under the at-least-once contract.
pub struct Inspector {
    config: InspectorConfig,
    keys: KeySpace,
    store: Arc<dyn Store>,
    shutdown: Arc<ShutdownState>,
}

impl Inspector {
    pub fn new(config: InspectorConfig, store: Arc<dyn Store>) -> Self {
        let keys = KeySpace::new(&config.queue);
        Inspector {
            config,
            keys,
            store,
            shutdown: Arc::new(ShutdownState {
                notify: Notify::new(),
                stopping: AtomicBool::new(false),
            }),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: self.shutdown.clone(),
        }
    }

    /// Run until shutdown, one scan per interval. A pass aborted by a
    /// store outage is retried at the next tick; the process never
    /// terminates because of one.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            "Starting inspector on queue {} (interval {:?})",
            self.keys.pending(),
            self.config.scan_interval()
        );

        let mut interval = tokio::time::interval(self.config.scan_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.shutdown.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    match self.scan().await {
                        Ok(report) => debug!("Scan complete: {:?}", report),
                        Err(e) => warn!("Scan aborted, store unavailable: {}", e),
                    }
                }
                _ = self.shutdown.notify.notified() => break,
            }
        }

        info!("Inspector stopped");
        Ok(())
    }

    /// One reconciliation pass: heartbeat sweep, orphan sweep, backlog
    /// check.
    pub async fn scan(&self) -> Result<ScanReport, StoreError> {
        let mut report = ScanReport::default();
        let live = self.sweep_heartbeats(Utc::now(), &mut report).await?;
        self.sweep_orphans(&live, &mut report).await?;
        self.check_backlog(&mut report).await?;
        Ok(report)
    }

    /// Walk the heartbeat registry. Stale workers are reaped; fresh ones
    /// are collected into a map keyed by worker id for the orphan sweep.
    async fn sweep_heartbeats(
        &self,
        now: DateTime<Utc>,
        report: &mut ScanReport,
    ) -> Result<HashMap<String, Heartbeat>, StoreError> {
        let registry_key = self.keys.registry();
        let ttl = self.config.heartbeat_ttl_secs as i64;
        let mut live = HashMap::new();

        for entry in self.store.list_all(&registry_key).await? {
            match Heartbeat::parse(&entry) {
                None => {
                    // left in place for operator cleanup
                    report.malformed_entries += 1;
                    warn!("Skipping malformed heartbeat entry {:?}", entry);
                }
                Some(beat) if beat.is_stale(now, ttl) => {
                    let moved = self.relocate(&self.keys.in_flight(&beat.worker_id)).await?;
                    self.store.remove_one(&registry_key, &entry).await?;
                    report.reaped_workers += 1;
                    report.relocated += moved;
                    warn!(
                        "Reaped worker {}: returned {} tasks to {}",
                        beat.worker_id,
                        moved,
                        self.keys.pending()
                    );
                }
                Some(beat) => {
                    live.insert(beat.worker_id.clone(), beat);
                }
            }
        }

        Ok(live)
    }

    /// Relocate any in-flight list whose worker has no registry entry at
    /// all, i.e. it crashed before it ever heart-beat.
    async fn sweep_orphans(
        &self,
        live: &HashMap<String, Heartbeat>,
        report: &mut ScanReport,
    ) -> Result<(), StoreError> {
        for key in self.store.scan_keys(self.keys.in_flight_prefix()).await? {
            let worker_id = match self.keys.worker_of(&key) {
                Some(worker_id) => worker_id,
                None => continue,
            };
            if live.contains_key(worker_id) {
                continue;
            }

            let moved = self.relocate(&key).await?;
            if moved > 0 {
                report.orphaned_lists += 1;
                report.relocated += moved;
                warn!(
                    "Relocated {} tasks from unregistered worker {}",
                    moved, worker_id
                );
            }
        }
        Ok(())
    }

    /// Observability only: one WARNING per scan when the queue exceeds
    /// the backlog threshold. Never mutates state.
    async fn check_backlog(&self, report: &mut ScanReport) -> Result<(), StoreError> {
        let backlog = self.store.length(self.keys.pending()).await?;
        report.backlog = backlog;
        if backlog > self.config.backlog_threshold {
            report.backlog_alert = true;
            warn!(
                "Queue {} backlog at {} tasks (threshold {})",
                self.keys.pending(),
                backlog,
                self.config.backlog_threshold
            );
        }
        Ok(())
    }

    /// Drain a worker's in-flight list back to the queue tail, oldest
    /// first, as a loop of single atomic moves. A crash mid-loop leaves
    /// a partial relocation for the next pass to finish.
    async fn relocate(&self, from: &str) -> Result<usize, StoreError> {
        let mut moved = 0;
        while self
            .store
            .claim(from, self.keys.pending())
            .await?
            .is_some()
        {
            moved += 1;
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::Map;
    use task_dispatch_core::Envelope;
    use task_dispatch_store::MemoryStore;

    const QUEUE: &str = "tasks";
    const REGISTRY: &str = "tasks:workers";

    fn inspector(store: Arc<MemoryStore>) -> Inspector {
        let config = InspectorConfig {
            queue: QUEUE.to_string(),
            heartbeat_ttl_secs: 300,
            backlog_threshold: 10,
            ..Default::default()
        };
        Inspector::new(config, store)
    }

    async fn push_beat(store: &MemoryStore, worker_id: &str, age_secs: i64) {
        let beat = Heartbeat::new(worker_id, Utc::now() - ChronoDuration::seconds(age_secs));
        store.push_tail(REGISTRY, &beat.format()).await.unwrap();
    }

    async fn push_task(store: &MemoryStore, key: &str, task_id: &str) {
        let envelope = Envelope::new(task_id, "A.b", Map::new());
        store
            .push_tail(key, &envelope.encode().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_worker_is_reaped() {
        // heartbeat 301s old with ttl 300, three claimed tasks
        let store = Arc::new(MemoryStore::new());
        push_beat(&store, "w1", 301).await;
        for task_id in ["1", "2", "3"] {
            push_task(&store, "tasks:inflight:w1", task_id).await;
        }

        let report = inspector(store.clone()).scan().await.unwrap();

        assert_eq!(report.reaped_workers, 1);
        assert_eq!(report.relocated, 3);

        let queued = store.list_all(QUEUE).await.unwrap();
        let ids: Vec<String> = queued
            .iter()
            .map(|raw| Envelope::decode(raw).unwrap().task_id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        assert_eq!(store.length(REGISTRY).await.unwrap(), 0);
        assert!(store.scan_keys("tasks:inflight:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_worker_is_left_alone() {
        let store = Arc::new(MemoryStore::new());
        push_beat(&store, "w1", 10).await;
        push_task(&store, "tasks:inflight:w1", "1").await;

        let report = inspector(store.clone()).scan().await.unwrap();

        assert_eq!(report.reaped_workers, 0);
        assert_eq!(report.relocated, 0);
        assert_eq!(store.length("tasks:inflight:w1").await.unwrap(), 1);
        assert_eq!(store.length(REGISTRY).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mixed_stale_and_fresh() {
        let store = Arc::new(MemoryStore::new());
        push_beat(&store, "dead", 400).await;
        push_beat(&store, "alive", 5).await;
        push_task(&store, "tasks:inflight:dead", "d1").await;
        push_task(&store, "tasks:inflight:alive", "a1").await;

        let report = inspector(store.clone()).scan().await.unwrap();

        assert_eq!(report.reaped_workers, 1);
        assert_eq!(report.relocated, 1);
        assert_eq!(store.length("tasks:inflight:alive").await.unwrap(), 1);
        assert_eq!(store.length(QUEUE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_skipped_and_kept() {
        let store = Arc::new(MemoryStore::new());
        store.push_tail(REGISTRY, "garbage entry").await.unwrap();
        push_beat(&store, "w1", 10).await;

        let report = inspector(store.clone()).scan().await.unwrap();

        assert_eq!(report.malformed_entries, 1);
        assert_eq!(report.reaped_workers, 0);
        assert_eq!(store.length(REGISTRY).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_orphan_in_flight_list_is_relocated() {
        // worker crashed before it ever heart-beat
        let store = Arc::new(MemoryStore::new());
        push_task(&store, "tasks:inflight:ghost", "1").await;
        push_task(&store, "tasks:inflight:ghost", "2").await;

        let report = inspector(store.clone()).scan().await.unwrap();

        assert_eq!(report.orphaned_lists, 1);
        assert_eq!(report.relocated, 2);
        assert_eq!(store.length(QUEUE).await.unwrap(), 2);
        assert!(store.scan_keys("tasks:inflight:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backlog_alert_fires_above_threshold() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..11 {
            push_task(&store, QUEUE, &i.to_string()).await;
        }

        let report = inspector(store.clone()).scan().await.unwrap();

        assert_eq!(report.backlog, 11);
        assert!(report.backlog_alert);
        // observability only: nothing moved
        assert_eq!(store.length(QUEUE).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_backlog_at_threshold_is_quiet() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..10 {
            push_task(&store, QUEUE, &i.to_string()).await;
        }

        let report = inspector(store.clone()).scan().await.unwrap();

        assert_eq!(report.backlog, 10);
        assert!(!report.backlog_alert);
    }

    #[tokio::test]
    async fn test_second_scan_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        push_beat(&store, "w1", 301).await;
        push_task(&store, "tasks:inflight:w1", "1").await;

        let inspector = inspector(store.clone());
        inspector.scan().await.unwrap();
        let report = inspector.scan().await.unwrap();

        assert_eq!(report.reaped_workers, 0);
        assert_eq!(report.relocated, 0);
        assert_eq!(report.backlog, 1);
    }
}
