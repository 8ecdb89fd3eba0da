/// Derives every store key from one logical queue name.
///
/// Consumers and the inspector must agree on this scheme; it is the only
/// shared namespace between them.
#[derive(Debug, Clone)]
pub struct KeySpace {
    queue: String,
    in_flight_prefix: String,
}

impl KeySpace {
    pub fn new(queue: impl Into<String>) -> Self {
        let queue = queue.into();
        let in_flight_prefix = format!("{}:inflight:", queue);
        KeySpace {
            queue,
            in_flight_prefix,
        }
    }

    /// The shared FIFO list producers push to and consumers claim from.
    pub fn pending(&self) -> &str {
        &self.queue
    }

    /// Heartbeat registry list, one `workerId:timestamp` entry per live
    /// worker.
    pub fn registry(&self) -> String {
        format!("{}:workers", self.queue)
    }

    /// A worker's in-flight list.
    pub fn in_flight(&self, worker_id: &str) -> String {
        format!("{}{}", self.in_flight_prefix, worker_id)
    }

    /// Prefix shared by every in-flight list; the orphan scan enumerates
    /// keys under it.
    pub fn in_flight_prefix(&self) -> &str {
        &self.in_flight_prefix
    }

    /// Extract the worker id from an in-flight key, if it is one.
    pub fn worker_of<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.in_flight_prefix.as_str())
            .filter(|id| !id.is_empty())
    }
}
