use std::sync::Arc;
use std::time::{Duration, Instant};
use task_dispatch_core::{Heartbeat, KeySpace};
use task_dispatch_store::{Store, StoreError};

/// Publishes this worker's liveness entry on a fixed cadence.
///
/// A refresh is replace-then-push: the previously written entry is
/// removed and a fresh `workerId:timestamp` appended, so the registry
/// holds one entry per live worker. Each refresh also re-arms the
/// registry key's expiry; the key only outlives a deployment by that
/// sliding window.
pub struct HeartbeatPublisher {
    store: Arc<dyn Store>,
    registry_key: String,
    worker_id: String,
    cadence: Duration,
    registry_expiry: Duration,
    last_entry: Option<String>,
    last_beat: Option<Instant>,
}

impl HeartbeatPublisher {
    pub fn new(
        store: Arc<dyn Store>,
        keys: &KeySpace,
        worker_id: impl Into<String>,
        cadence: Duration,
        registry_expiry: Duration,
    ) -> Self {
        HeartbeatPublisher {
            store,
            registry_key: keys.registry(),
            worker_id: worker_id.into(),
            cadence,
            registry_expiry,
            last_entry: None,
            last_beat: None,
        }
    }

    /// Publish when the cadence has elapsed; no-op otherwise. Called on
    /// every consumer loop iteration so an idle worker still beats.
    pub async fn beat_if_due(&mut self) -> Result<(), StoreError> {
        let due = self
            .last_beat
            .is_none_or(|at| at.elapsed() >= self.cadence);
        if due {
            self.beat().await?;
        }
        Ok(())
    }

    /// Publish unconditionally.
    pub async fn beat(&mut self) -> Result<(), StoreError> {
        let entry = Heartbeat::now(&self.worker_id).format();

        if let Some(prev) = &self.last_entry {
            // a repeated removal after a half-finished refresh is a no-op
            self.store.remove_one(&self.registry_key, prev).await?;
        }
        self.store.push_tail(&self.registry_key, &entry).await?;
        self.store
            .expire(&self.registry_key, self.registry_expiry)
            .await?;

        self.last_entry = Some(entry);
        self.last_beat = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_dispatch_store::MemoryStore;

    fn publisher(store: Arc<MemoryStore>, cadence: Duration) -> HeartbeatPublisher {
        HeartbeatPublisher::new(
            store,
            &KeySpace::new("tasks"),
            "worker-1",
            cadence,
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn test_beat_publishes_parseable_entry() {
        let store = Arc::new(MemoryStore::new());
        let mut publisher = publisher(store.clone(), Duration::from_secs(15));

        publisher.beat().await.unwrap();

        let entries = store.list_all("tasks:workers").await.unwrap();
        assert_eq!(entries.len(), 1);
        let beat = Heartbeat::parse(&entries[0]).unwrap();
        assert_eq!(beat.worker_id, "worker-1");
    }

    #[tokio::test]
    async fn test_refresh_replaces_previous_entry() {
        let store = Arc::new(MemoryStore::new());
        let mut publisher = publisher(store.clone(), Duration::from_secs(15));

        publisher.beat().await.unwrap();
        publisher.beat().await.unwrap();
        publisher.beat().await.unwrap();

        let entries = store.list_all("tasks:workers").await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_beat_if_due_publishes_first_time() {
        let store = Arc::new(MemoryStore::new());
        let mut publisher = publisher(store.clone(), Duration::from_secs(3600));

        publisher.beat_if_due().await.unwrap();

        assert_eq!(store.length("tasks:workers").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_cadence_stays_single_entry() {
        let store = Arc::new(MemoryStore::new());
        let mut publisher = publisher(store.clone(), Duration::ZERO);

        publisher.beat_if_due().await.unwrap();
        publisher.beat_if_due().await.unwrap();

        assert_eq!(store.length("tasks:workers").await.unwrap(), 1);
    }
}
