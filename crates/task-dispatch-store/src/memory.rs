use crate::{Store, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// In-memory store with the same observable semantics as the Redis
/// backend: implicit list creation, key removal on empty, per-key
/// expiry. One mutex covers every operation, which is what makes
/// `claim` atomic.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    lists: HashMap<String, VecDeque<String>>,
    deadlines: HashMap<String, Instant>,
}

impl Inner {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.lists.remove(&key);
            self.deadlines.remove(&key);
        }
    }

    fn drop_if_empty(&mut self, key: &str) {
        if self.lists.get(key).is_some_and(|list| list.is_empty()) {
            self.lists.remove(key);
            self.deadlines.remove(key);
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn push_tail(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.purge_expired();
        inner
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn claim(&self, from: &str, to: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.purge_expired();

        let payload = match inner.lists.get_mut(from).and_then(VecDeque::pop_front) {
            Some(payload) => payload,
            None => return Ok(None),
        };
        inner.drop_if_empty(from);
        inner
            .lists
            .entry(to.to_string())
            .or_default()
            .push_back(payload.clone());
        Ok(Some(payload))
    }

    async fn length(&self, key: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        inner.purge_expired();
        Ok(inner.lists.get(key).map_or(0, |list| list.len() as u64))
    }

    async fn list_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.purge_expired();
        Ok(inner
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_one(&self, key: &str, payload: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.purge_expired();

        let removed = match inner.lists.get_mut(key) {
            Some(list) => match list.iter().position(|entry| entry == payload) {
                Some(index) => {
                    list.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };
        inner.drop_if_empty(key);
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.purge_expired();
        if inner.lists.contains_key(key) {
            inner.deadlines.insert(key.to_string(), Instant::now() + ttl);
        }
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.purge_expired();
        Ok(inner
            .lists
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let store = MemoryStore::new();
        store.push_tail("q", "a").await.unwrap();
        store.push_tail("q", "b").await.unwrap();
        store.push_tail("q", "c").await.unwrap();

        assert_eq!(store.claim("q", "w").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.claim("q", "w").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.claim("q", "w").await.unwrap().as_deref(), Some("c"));
        assert_eq!(store.claim("q", "w").await.unwrap(), None);

        // moved entries keep their order on the destination list
        assert_eq!(store.list_all("w").await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_claim_on_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.claim("nope", "w").await.unwrap(), None);
        assert_eq!(store.length("w").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_list_drops_its_key() {
        let store = MemoryStore::new();
        store.push_tail("q", "a").await.unwrap();
        store.claim("q", "w").await.unwrap();

        let keys = store.scan_keys("").await.unwrap();
        assert!(!keys.contains(&"q".to_string()));
        assert!(keys.contains(&"w".to_string()));
    }

    #[tokio::test]
    async fn test_remove_one_is_idempotent() {
        let store = MemoryStore::new();
        store.push_tail("q", "a").await.unwrap();

        assert!(store.remove_one("q", "a").await.unwrap());
        assert!(!store.remove_one("q", "a").await.unwrap());
        assert!(!store.remove_one("missing", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_one_takes_head_most_match() {
        let store = MemoryStore::new();
        for payload in ["x", "y", "x"] {
            store.push_tail("q", payload).await.unwrap();
        }

        assert!(store.remove_one("q", "x").await.unwrap());
        assert_eq!(store.list_all("q").await.unwrap(), vec!["y", "x"]);
    }

    #[tokio::test]
    async fn test_expire_purges_key() {
        let store = MemoryStore::new();
        store.push_tail("q", "a").await.unwrap();
        store.expire("q", Duration::ZERO).await.unwrap();

        assert_eq!(store.length("q").await.unwrap(), 0);
        assert!(store.list_all("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expire_on_missing_key_is_noop() {
        let store = MemoryStore::new();
        store.expire("nope", Duration::ZERO).await.unwrap();
        assert_eq!(store.length("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scan_keys_by_prefix() {
        let store = MemoryStore::new();
        store.push_tail("tasks:inflight:w1", "a").await.unwrap();
        store.push_tail("tasks:inflight:w2", "b").await.unwrap();
        store.push_tail("tasks", "c").await.unwrap();

        let mut keys = store.scan_keys("tasks:inflight:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["tasks:inflight:w1", "tasks:inflight:w2"]);
    }
}
