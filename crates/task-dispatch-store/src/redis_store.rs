use crate::{Store, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Redis-backed store.
///
/// Lists grow with LPUSH, so the head of the logical FIFO sits at the
/// right end and `claim` is a plain RPOPLPUSH. The `ConnectionManager`
/// reconnects on its own; callers still see errors while the link is
/// down and are expected to retry with backoff.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisStore { conn })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn push_tail(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, payload).await?;
        Ok(())
    }

    async fn claim(&self, from: &str, to: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.rpoplpush(from, to).await?;
        Ok(payload)
    }

    async fn length(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(key).await?;
        Ok(len)
    }

    async fn list_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        // LRANGE walks tail to head under LPUSH growth
        let mut entries: Vec<String> = conn.lrange(key, 0, -1).await?;
        entries.reverse();
        Ok(entries)
    }

    async fn remove_one(&self, key: &str, payload: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        // negative count searches from the head end of the FIFO
        let removed: i64 = conn.lrem(key, -1, payload).await?;
        Ok(removed > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(&pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}
