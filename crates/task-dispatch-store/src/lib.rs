//! Client contract for the shared keyed list store the dispatch engine
//! coordinates through, with a Redis-backed implementation and an
//! in-memory one for tests and local runs.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod memory;
mod redis_store;
mod retry;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;
pub use self::retry::Backoff;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// The coordination primitive everything runs on: keyed FIFO lists with
/// an atomic single-element move between two of them.
///
/// Lists are created implicitly on first push and disappear with their
/// key once emptied. No other coordination is assumed of the backend.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append a payload to the tail of the list at `key`.
    async fn push_tail(&self, key: &str, payload: &str) -> Result<(), StoreError>;

    /// Atomically move the head of `from` to the tail of `to`.
    ///
    /// A payload is delivered to at most one caller. Returns `None`
    /// when `from` is empty or missing.
    async fn claim(&self, from: &str, to: &str) -> Result<Option<String>, StoreError>;

    /// Number of entries in the list at `key` (0 when missing).
    async fn length(&self, key: &str) -> Result<u64, StoreError>;

    /// All entries of the list at `key`, head first.
    async fn list_all(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Remove one head-most entry equal to `payload`. Returns `false`
    /// when no such entry exists, so racing removals stay idempotent.
    async fn remove_one(&self, key: &str, payload: &str) -> Result<bool, StoreError>;

    /// Arm or refresh a time-to-live on `key`.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Enumerate keys starting with `prefix`.
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
