//! Response cache for gateway calls.
//!
//! Cached values are pure functions of their key, so concurrent writers may
//! race freely: the last write wins and every write is complete on its own.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
        }
    }
}

/// Cache stores never fail loudly: an unreachable store behaves as empty.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;
    async fn put(&self, key: &str, entry: CacheEntry);
}

/// `<operation>|<model>|<sha256 hex of input>`.
pub fn cache_key(operation: &str, model: &str, input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{}|{}|{}", operation, model, hex::encode(digest))
}

/// Process-lifetime cache.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().ok()?;
        entries.get(key).cloned()
    }

    async fn put(&self, key: &str, entry: CacheEntry) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), entry);
            }
            Err(_) => warn!(key, "memory cache lock poisoned; dropping write"),
        }
    }
}

const REDIS_KEY_PREFIX: &str = "jobfit:cache:";

/// Shared cache backed by Redis. Entries are stored as JSON strings.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: MultiplexedConnection,
    ttl_secs: Option<u64>,
}

impl RedisCacheStore {
    pub async fn connect(url: &str, ttl_secs: Option<u64>) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, ttl_secs })
    }

    fn redis_key(key: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(Self::redis_key(key)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "redis cache read failed; treating as miss");
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    async fn put(&self, key: &str, entry: CacheEntry) {
        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "could not serialise cache entry");
                return;
            }
        };
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = match self.ttl_secs {
            Some(ttl) => conn.set_ex(Self::redis_key(key), payload, ttl).await,
            None => conn.set(Self::redis_key(key), payload).await,
        };
        if let Err(e) = result {
            warn!(error = %e, "redis cache write failed");
        }
    }
}
