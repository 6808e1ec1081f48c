//used parking_lot::RwLock over std::sync::RwLock as prior one is designed for speed, fairness, no poisioning and has lower memory usage

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Expiring key-value store shared by every in-flight request. Values set
/// with a TTL are evicted by the store itself; callers never poll for expiry.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;
    async fn set_forever(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Redis-backed store. `ConnectionManager` reconnects on its own, so a
/// transient outage surfaces as per-operation errors rather than a dead handle.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs.max(1)).await?;
        Ok(())
    }

    async fn set_forever(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-process store with per-entry expiry. Used when no redis URL is
/// configured, and as the store double in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of a TTL'd key, if present and unexpired.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        let expires_at = entry.expires_at?;
        let now = Instant::now();
        (expires_at > now).then(|| expires_at - now)
    }

    fn insert(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().insert(key.to_string(), entry);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.expires_at.is_none_or(|at| at > Instant::now()) => {
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                // Expired, drop it on the way out.
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.insert(key, value, Some(Duration::from_secs(ttl_secs)));
        Ok(())
    }

    async fn set_forever(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.insert(key, value, None);
        Ok(())
    }
}
