use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectorConfig {
    pub store_url: String,
    pub queue: String,
    pub scan_interval_secs: u64,
    pub heartbeat_ttl_secs: u64,
    pub backlog_threshold: u64,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        InspectorConfig {
            store_url: "redis://127.0.0.1:6379".to_string(),
            queue: "tasks".to_string(),
            scan_interval_secs: 5,
            heartbeat_ttl_secs: 300,
            backlog_threshold: 10,
        }
    }
}

impl InspectorConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: InspectorConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}
