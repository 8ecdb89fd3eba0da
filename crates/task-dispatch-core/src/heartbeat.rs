use chrono::{DateTime, TimeZone, Utc};

/// One worker's liveness record: the last time it reported in.
///
/// On the wire this is a `workerId:timestamp` registry entry with the
/// timestamp in unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Heartbeat {
    pub fn new(worker_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Heartbeat {
            worker_id: worker_id.into(),
            timestamp,
        }
    }

    pub fn now(worker_id: impl Into<String>) -> Self {
        Heartbeat::new(worker_id, Utc::now())
    }

    /// Registry entry text.
    pub fn format(&self) -> String {
        format!("{}:{}", self.worker_id, self.timestamp.timestamp())
    }

    /// Parse a registry entry. The timestamp is split off at the last
    /// colon, so worker ids may themselves contain colons.
    pub fn parse(raw: &str) -> Option<Heartbeat> {
        let (worker_id, ts) = raw.rsplit_once(':')?;
        if worker_id.is_empty() {
            return None;
        }
        let secs: i64 = ts.parse().ok()?;
        let timestamp = Utc.timestamp_opt(secs, 0).single()?;
        Some(Heartbeat::new(worker_id, timestamp))
    }

    /// Stale when strictly more than `ttl_secs` has passed since the
    /// last beat.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl_secs: i64) -> bool {
        (now - self.timestamp).num_seconds() > ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_parse_round_trip() {
        let beat = Heartbeat::new("host-42-af3", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let parsed = Heartbeat::parse(&beat.format()).unwrap();

        assert_eq!(parsed, beat);
    }

    #[test]
    fn test_parse_worker_id_with_colons() {
        let parsed = Heartbeat::parse("node:a:b:1700000000").unwrap();

        assert_eq!(parsed.worker_id, "node:a:b");
        assert_eq!(parsed.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_rejects_malformed_entries() {
        assert!(Heartbeat::parse("").is_none());
        assert!(Heartbeat::parse("no-timestamp").is_none());
        assert!(Heartbeat::parse("worker:notanumber").is_none());
        assert!(Heartbeat::parse(":1700000000").is_none());
    }

    #[test]
    fn test_staleness_boundary() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let fresh = Heartbeat::new("w", now - Duration::seconds(299));
        let exact = Heartbeat::new("w", now - Duration::seconds(300));
        let stale = Heartbeat::new("w", now - Duration::seconds(301));

        assert!(!fresh.is_stale(now, 300));
        assert!(!exact.is_stale(now, 300));
        assert!(stale.is_stale(now, 300));
    }
}
