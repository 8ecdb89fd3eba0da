use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use task_dispatch_core::Outcome;

/// A unit of executable work, resolved by target name.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the operation with the envelope's parameters.
    ///
    /// Expected failures are data (`Fail`/`Error`), not panics. Panics
    /// are programmer errors; the invoker folds them into `Fail`.
    async fn handle(&self, parameters: &Map<String, Value>) -> Outcome;
}

/// Registry of handlers by target name (e.g. "Notification.deliver"),
/// populated at startup.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for a target name.
    pub fn register<H: Handler + 'static>(&self, target: impl Into<String>, handler: H) {
        let mut handlers = self.handlers.write();
        handlers.insert(target.into(), Arc::new(handler));
    }

    /// Resolve a target name to its handler.
    pub fn get(&self, target: &str) -> Option<Arc<dyn Handler>> {
        let handlers = self.handlers.read();
        handlers.get(target).cloned()
    }

    pub fn has_handler(&self, target: &str) -> bool {
        let handlers = self.handlers.read();
        handlers.contains_key(target)
    }

    /// All registered target names.
    pub fn targets(&self) -> Vec<String> {
        let handlers = self.handlers.read();
        handlers.keys().cloned().collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in handler that logs its parameters and succeeds.
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, parameters: &Map<String, Value>) -> Outcome {
        tracing::info!("Echo: {}", serde_json::Value::Object(parameters.clone()));
        Outcome::Ok
    }
}

/// Built-in handler that simulates work by sleeping.
pub struct SleepHandler {
    duration_ms: u64,
}

impl SleepHandler {
    pub fn new(duration_ms: u64) -> Self {
        SleepHandler { duration_ms }
    }
}

#[async_trait]
impl Handler for SleepHandler {
    async fn handle(&self, _parameters: &Map<String, Value>) -> Outcome {
        tokio::time::sleep(tokio::time::Duration::from_millis(self.duration_ms)).await;
        Outcome::Ok
    }
}
