//! Session cache: the server-side half of token revocation
//!
//! Holds at most one entry per account (`session:<account id>` mapping to
//! the currently valid token string) with a TTL matching the token's own
//! expiry. Presence plus exact string match is the sole revocation check.
//!
//! The cache contract is deliberately thin: best-effort `set`/`delete`,
//! and a `get` whose failure the caller must treat as fail-closed.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Session cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Session cache unavailable: {0}")]
    Unavailable(String),

    #[error("Session cache command timed out")]
    Timeout,
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

/// Key-value contract consumed by the auth service.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Redis-backed session cache.
///
/// Shares one multiplexed `ConnectionManager`, which reconnects
/// transparently; callers only ever see the timeout/unavailable kinds.
/// Every command is bounded by the configured timeout so a cache outage
/// cannot stall request handling.
#[derive(Clone)]
pub struct RedisSessionCache {
    connection: redis::aio::ConnectionManager,
    command_timeout: Duration,
}

impl RedisSessionCache {
    /// Connect to Redis and set up the shared connection manager.
    pub async fn connect(url: &str, command_timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::from)?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(CacheError::from)?;

        Ok(Self {
            connection,
            command_timeout,
        })
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, redis::RedisError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout),
        }
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let key = key.to_string();
        let value = value.to_string();
        self.bounded(async move { connection.set_ex::<_, _, ()>(key, value, ttl_secs).await })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let key = key.to_string();
        self.bounded(async move { connection.get::<_, Option<String>>(key).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let key = key.to_string();
        self.bounded(async move { connection.del::<_, ()>(key).await })
            .await
    }
}

/// In-memory session cache for single-node development and tests.
///
/// Mirrors the Redis behavior, including TTL-based expiry on read.
#[derive(Default)]
pub struct MemorySessionCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
