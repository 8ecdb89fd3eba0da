use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub store_url: String,
    pub queue: String,
    pub worker_id: Option<String>,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_ttl_secs: u64,
    pub max_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            store_url: "redis://127.0.0.1:6379".to_string(),
            queue: "tasks".to_string(),
            worker_id: None,
            poll_interval_ms: 500,
            heartbeat_interval_secs: 15,
            heartbeat_ttl_secs: 300,
            max_attempts: 5,
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Bounded sleep between claims on an empty queue.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Sliding expiry armed on the registry key at each beat; kept well
    /// above the staleness TTL so only a fully dead deployment clears it.
    pub fn registry_expiry(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs * 2)
    }

    pub fn generate_worker_id(&self) -> String {
        use std::process;
        use uuid::Uuid;

        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let pid = process::id();
        let random = Uuid::new_v4()
            .to_string()
            .split('-')
            .next()
            .unwrap()
            .to_string();

        format!("{}-{}-{}", hostname, pid, random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_worker_id_wins() {
        let config = WorkerConfig {
            worker_id: Some("pinned".to_string()),
            ..Default::default()
        };
        assert_eq!(config.generate_worker_id(), "pinned");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let config = WorkerConfig::default();
        assert_ne!(config.generate_worker_id(), config.generate_worker_id());
    }
}
