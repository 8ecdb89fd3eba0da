use crate::config::WorkerConfig;
use crate::handler::HandlerRegistry;
use crate::heartbeat::HeartbeatPublisher;
use crate::invoke::invoke;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use task_dispatch_core::{decide, Action, Envelope, KeySpace, Outcome};
use task_dispatch_store::{Backoff, Store, StoreError};

const RECONNECT_INITIAL: Duration = Duration::from_millis(500);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

struct ShutdownState {
    notify: Notify,
    stopping: AtomicBool,
}

/// Requests a graceful stop: the consumer finishes the task it is
/// currently processing, then exits its loop.
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

/// One worker identity running the claim → decode → dispatch → outcome
/// loop against the shared store.
///
/// Correctness across many consumers rests solely on the store's
/// atomic `claim`; no consumer-side locking exists.
pub struct Consumer {
    config: WorkerConfig,
    worker_id: String,
    keys: KeySpace,
    in_flight_key: String,
    store: Arc<dyn Store>,
    handlers: Arc<HandlerRegistry>,
    shutdown: Arc<ShutdownState>,
}

impl Consumer {
    pub fn new(config: WorkerConfig, store: Arc<dyn Store>, handlers: Arc<HandlerRegistry>) -> Self {
        let worker_id = config.generate_worker_id();
        let keys = KeySpace::new(&config.queue);
        let in_flight_key = keys.in_flight(&worker_id);

        Consumer {
            config,
            worker_id,
            keys,
            in_flight_key,
            store,
            handlers,
            shutdown: Arc::new(ShutdownState {
                notify: Notify::new(),
                stopping: AtomicBool::new(false),
            }),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: self.shutdown.clone(),
        }
    }

    /// Run until shutdown. Store outages are ridden out with backoff;
    /// this loop never terminates on its own because of one.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            "Starting consumer {} on queue {}",
            self.worker_id,
            self.keys.pending()
        );

        let mut heartbeat = HeartbeatPublisher::new(
            self.store.clone(),
            &self.keys,
            self.worker_id.clone(),
            self.config.heartbeat_interval(),
            self.config.registry_expiry(),
        );
        let mut backoff = Backoff::new(RECONNECT_INITIAL, RECONNECT_MAX);

        // The first beat must precede the first claim, or the orphan
        // scan could reap a fresh worker's in-flight list.
        if let Err(e) = heartbeat.beat().await {
            warn!("Failed to publish initial heartbeat: {}", e);
        }

        while !self.stopping() {
            if let Err(e) = heartbeat.beat_if_due().await {
                warn!("Failed to refresh heartbeat: {}", e);
            }

            match self.poll_once().await {
                Ok(true) => {
                    backoff.reset();
                }
                Ok(false) => {
                    backoff.reset();
                    self.wait(self.config.poll_interval()).await;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!("Store unavailable ({}), retrying in {:?}", e, delay);
                    self.wait(delay).await;
                }
            }
        }

        info!("Consumer {} stopped", self.worker_id);
        Ok(())
    }

    /// Claim and process at most one task. Returns whether one was
    /// handled. Claiming from an empty queue mutates nothing.
    pub async fn poll_once(&self) -> Result<bool, StoreError> {
        match self
            .store
            .claim(self.keys.pending(), &self.in_flight_key)
            .await?
        {
            Some(raw) => {
                self.process(&raw).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn process(&self, raw: &str) {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                // malformed envelopes are never retried
                error!("Dropping malformed envelope: {}", e);
                self.discard(raw).await;
                return;
            }
        };

        let handler = match self.handlers.get(&envelope.target) {
            Some(handler) => handler,
            None => {
                error!(
                    "Dropping task {}: no handler registered for target {}",
                    envelope.task_id, envelope.target
                );
                self.discard(raw).await;
                return;
            }
        };

        debug!(
            "Dispatching task {} to {} (attempt {})",
            envelope.task_id, envelope.target, envelope.attempts
        );
        let outcome = invoke(handler, &envelope.parameters).await;
        self.apply(raw, &envelope, &outcome).await;
    }

    async fn apply(&self, raw: &str, envelope: &Envelope, outcome: &Outcome) {
        match decide(outcome, envelope.attempts, self.config.max_attempts) {
            Action::Ack => {
                self.discard(raw).await;
                info!("Task {} completed", envelope.task_id);
            }
            Action::Requeue { attempts } => {
                let mut retry = envelope.clone();
                retry.attempts = attempts;
                let encoded = match retry.encode() {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        error!("Dropping task {}: re-encode failed: {}", envelope.task_id, e);
                        self.discard(raw).await;
                        return;
                    }
                };

                // Push before removing: a crash in between duplicates
                // the task, never loses it.
                if self
                    .with_retry("requeue push", || {
                        self.store.push_tail(self.keys.pending(), &encoded)
                    })
                    .await
                    .is_none()
                {
                    return;
                }
                self.discard(raw).await;
                warn!(
                    "Task {} failed, requeued to {} (attempt {}/{})",
                    envelope.task_id,
                    self.keys.pending(),
                    attempts,
                    self.config.max_attempts
                );
            }
            Action::Drop { reason } => {
                self.discard(raw).await;
                error!("Dropping task {}: {}", envelope.task_id, reason);
            }
        }
    }

    /// Remove one in-flight entry. An entry already gone means the
    /// inspector reaped us mid-task; that removal is an idempotent
    /// no-op, not an error.
    async fn discard(&self, raw: &str) {
        match self
            .with_retry("in-flight removal", || {
                self.store.remove_one(&self.in_flight_key, raw)
            })
            .await
        {
            Some(true) | None => {}
            Some(false) => {
                debug!("In-flight entry already removed, likely reclaimed by the inspector");
            }
        }
    }

    /// Retry a store mutation with backoff until it succeeds, giving up
    /// only when shutdown is requested mid-outage.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut backoff = Backoff::new(RECONNECT_INITIAL, RECONNECT_MAX);
        loop {
            match op().await {
                Ok(value) => return Some(value),
                Err(e) => {
                    if self.stopping() {
                        warn!("Abandoning {} during shutdown: {}", what, e);
                        return None;
                    }
                    let delay = backoff.next_delay();
                    warn!(
                        "Store unavailable during {} ({}), retrying in {:?}",
                        what, e, delay
                    );
                    self.wait(delay).await;
                }
            }
        }
    }

    fn stopping(&self) -> bool {
        self.shutdown.stopping.load(Ordering::SeqCst)
    }

    /// Timed wait, cut short by a shutdown request.
    async fn wait(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.notify.notified() => {}
        }
    }
}
