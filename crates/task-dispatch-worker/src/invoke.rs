use crate::handler::Handler;
use serde_json::{Map, Value};
use std::sync::Arc;
use task_dispatch_core::Outcome;
use tracing::error;

/// Run a handler, isolating panics.
///
/// The handler runs on its own task so a panic unwinds there instead of
/// tearing down the consumer loop. A panicking handler counts as a
/// transient `Fail`, which keeps it subject to the attempts limit.
///
/// There is deliberately no execution timeout here: a hung handler
/// stalls its worker's heartbeat, and heartbeat staleness is how the
/// inspector reclaims the work.
pub async fn invoke(handler: Arc<dyn Handler>, parameters: &Map<String, Value>) -> Outcome {
    let parameters = parameters.clone();
    let task = tokio::spawn(async move { handler.handle(&parameters).await });

    match task.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            error!("Handler panicked during execution");
            Outcome::Fail("handler panicked".to_string())
        }
        Err(_) => Outcome::Fail("handler task cancelled".to_string()),
    }
}
