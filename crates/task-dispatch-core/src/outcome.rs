/// What a handler reports back for one task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The task is done; acknowledge and forget it.
    Ok,
    /// Transient failure; the task may be retried.
    Fail(String),
    /// Permanent failure; the task must never be retried.
    Error(String),
}

/// Store mutation the consumer performs after an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Remove the task from the worker's in-flight list.
    Ack,
    /// Push the envelope back to the queue tail with the advanced
    /// counter, then remove the old in-flight entry.
    Requeue { attempts: u32 },
    /// Remove the task from the in-flight list; it is gone for good.
    Drop { reason: String },
}

/// Decide what happens to a finished task.
///
/// `Error` always drops, regardless of attempts. `Fail` consumes one
/// attempt and requeues until `max_attempts` is reached.
pub fn decide(outcome: &Outcome, attempts: u32, max_attempts: u32) -> Action {
    match outcome {
        Outcome::Ok => Action::Ack,
        Outcome::Error(reason) => Action::Drop {
            reason: format!("permanent error: {}", reason),
        },
        Outcome::Fail(reason) => {
            let attempts = attempts.saturating_add(1);
            if attempts >= max_attempts {
                Action::Drop {
                    reason: format!(
                        "attempts limit reached ({}/{}): {}",
                        attempts, max_attempts, reason
                    ),
                }
            } else {
                Action::Requeue { attempts }
            }
        }
    }
}
