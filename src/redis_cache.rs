//! Redis-backed [`CacheBackend`].
//!
//! Holds a [`ConnectionManager`], which reconnects on its own; every call
//! works on a cheap clone of it. Batch writes and TTL refreshes go out as
//! one pipeline.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use rootcause_core::cache::{CacheBackend, EmbeddingCache};

use crate::config::Config;

const SCAN_COUNT: usize = 1000;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub struct RedisCacheBackend {
    conn: ConnectionManager,
}

impl RedisCacheBackend {
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).with_context(|| format!("Invalid cache.url: '{}'", url))?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .with_context(|| format!("Timed out connecting to Redis at '{}'", url))?
            .with_context(|| format!("Failed to connect to Redis at '{}'", url))?;
        Ok(Self { conn })
    }
}

/// Open the embedding cache described by `config`.
///
/// The cache is optional: when Redis is unreachable this logs a warning
/// and returns `None`, and callers carry on as if every lookup missed.
pub async fn open_cache(config: &Config) -> Option<EmbeddingCache<RedisCacheBackend>> {
    match RedisCacheBackend::connect(&config.cache.url).await {
        Ok(backend) => Some(EmbeddingCache::with_ttl(backend, config.cache.ttl())),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "embedding cache unavailable");
            None
        }
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn set_ex_many(&self, items: &[(String, String)], ttl: Duration) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for (key, value) in items {
            pipe.set_ex(key, value, ttl_secs(ttl)).ignore();
        }
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn expire(&self, keys: &[String], ttl: Duration) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let secs = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.expire(key, secs).ignore();
        }
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
        Ok(removed)
    }

    /// Counts with a `SCAN` cursor rather than `KEYS`, so large caches
    /// never block the server.
    async fn count_keys(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut total: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            total += keys.len() as u64;
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(total)
    }
}
