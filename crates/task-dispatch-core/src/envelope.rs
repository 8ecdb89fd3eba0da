use crate::error::EnvelopeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A unit of deferred work: which handler to run, with what parameters,
/// and how many attempts it has consumed so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque task identifier assigned by the producer.
    #[serde(rename = "taskId")]
    pub task_id: String,

    /// Handler identifier, e.g. "Notification.deliver".
    pub target: String,

    /// Structured arguments passed through to the handler.
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Requeue counter. Only ever increases, by exactly 1 per requeue.
    #[serde(default)]
    pub attempts: u32,
}

impl Envelope {
    pub fn new(
        task_id: impl Into<String>,
        target: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Envelope {
            task_id: task_id.into(),
            target: target.into(),
            parameters,
            attempts: 0,
        }
    }

    /// Parse an envelope from the store's transport text.
    ///
    /// Fails when the text is not valid JSON, when `taskId` or `target`
    /// are missing or empty, or when `attempts` is not a non-negative
    /// integer. Unknown extra fields are ignored.
    pub fn decode(raw: &str) -> Result<Envelope, EnvelopeError> {
        let envelope: Envelope = serde_json::from_str(raw)?;

        if envelope.task_id.is_empty() {
            return Err(EnvelopeError::MissingField("taskId"));
        }
        if envelope.target.is_empty() {
            return Err(EnvelopeError::MissingField("target"));
        }

        Ok(envelope)
    }

    /// Serialize to the store's transport text. Strict inverse of
    /// `decode` for the defined fields.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}
