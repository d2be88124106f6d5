//! Best-effort embedding cache keyed by content hash.
//!
//! [`EmbeddingCache`] sits in front of the embedding provider: a chunk
//! whose content hash is cached does not need to be embedded again. The
//! cache is never a source of truth and never fails its caller. Backend
//! errors, malformed payloads and vectors of the wrong length are logged
//! and reported as misses, so upstream simply recomputes.
//!
//! Storage goes through the [`CacheBackend`] trait: Redis in the app
//! crate, [`memory::InMemoryCacheBackend`] for tests. Entries use a
//! sliding TTL that is refreshed on every hit.

pub mod memory;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::embedding::has_expected_dims;

/// Default entry lifetime: 30 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const KEY_PREFIX: &str = "embedding:";

/// Key-value storage with expiry, shaped after the Redis commands the
/// cache needs. Values are JSON payloads.
///
/// Batch methods must complete in a single round-trip.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Values for `keys`, positionally aligned.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn set_ex_many(&self, items: &[(String, String)], ttl: Duration) -> Result<()>;

    /// Reset the expiry of every existing key in `keys`.
    async fn expire(&self, keys: &[String], ttl: Duration) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Returns the number of keys removed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Approximate number of keys matching a `prefix*` pattern.
    async fn count_keys(&self, pattern: &str) -> Result<u64>;
}

/// Hit/miss counters since construction or the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    pub hit_rate: f64,
}

/// Embedding cache over a [`CacheBackend`].
pub struct EmbeddingCache<B> {
    backend: B,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache key for a content hash.
pub fn cache_key(content_hash: &str) -> String {
    format!("{}{}", KEY_PREFIX, content_hash)
}

fn decode(content_hash: &str, payload: &str) -> Option<Vec<f32>> {
    let vector: Vec<f32> = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(hash = content_hash, error = %e, "malformed cached embedding");
            return None;
        }
    };
    if !has_expected_dims(&vector) {
        tracing::warn!(
            hash = content_hash,
            dims = vector.len(),
            "cached embedding has wrong dimensions"
        );
        return None;
    }
    Some(vector)
}

impl<B: CacheBackend> EmbeddingCache<B> {
    pub fn new(backend: B) -> Self {
        Self::with_ttl(backend, DEFAULT_TTL)
    }

    pub fn with_ttl(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn record(&self, hits: u64, misses: u64) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);
    }

    /// Look up one embedding. A hit refreshes the entry's TTL.
    pub async fn get(&self, content_hash: &str) -> Option<Vec<f32>> {
        let key = cache_key(content_hash);
        let payload = match self.backend.get(&key).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(hash = content_hash, error = %e, "cache get failed");
                None
            }
        };

        match payload.and_then(|p| decode(content_hash, &p)) {
            Some(vector) => {
                if let Err(e) = self.backend.expire(&[key], self.ttl).await {
                    tracing::warn!(hash = content_hash, error = %e, "cache ttl refresh failed");
                }
                self.record(1, 0);
                Some(vector)
            }
            None => {
                self.record(0, 1);
                None
            }
        }
    }

    /// Store one embedding. Vectors of the wrong length are dropped.
    pub async fn set(&self, content_hash: &str, vector: &[f32]) {
        if !has_expected_dims(vector) {
            tracing::debug!(hash = content_hash, dims = vector.len(), "not caching embedding");
            return;
        }
        let payload = match serde_json::to_string(vector) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(hash = content_hash, error = %e, "cannot encode embedding");
                return;
            }
        };
        if let Err(e) = self
            .backend
            .set_ex(&cache_key(content_hash), &payload, self.ttl)
            .await
        {
            tracing::warn!(hash = content_hash, error = %e, "cache set failed");
        }
    }

    /// Look up many embeddings in one round-trip.
    ///
    /// Returns only the hits, keyed by content hash. Only the keys
    /// actually found get their TTL refreshed. If the batch fails every
    /// requested hash counts as a miss.
    pub async fn get_many(&self, content_hashes: &[String]) -> HashMap<String, Vec<f32>> {
        let mut found = HashMap::new();
        if content_hashes.is_empty() {
            return found;
        }

        let keys: Vec<String> = content_hashes.iter().map(|h| cache_key(h)).collect();
        let payloads = match self.backend.mget(&keys).await {
            Ok(p) if p.len() == keys.len() => p,
            Ok(p) => {
                tracing::warn!(
                    requested = keys.len(),
                    returned = p.len(),
                    "cache batch returned mismatched results"
                );
                self.record(0, content_hashes.len() as u64);
                return found;
            }
            Err(e) => {
                tracing::warn!(count = keys.len(), error = %e, "cache batch get failed");
                self.record(0, content_hashes.len() as u64);
                return found;
            }
        };

        let mut refresh = Vec::new();
        for ((hash, key), payload) in content_hashes.iter().zip(keys).zip(payloads) {
            if let Some(vector) = payload.and_then(|p| decode(hash, &p)) {
                found.insert(hash.clone(), vector);
                refresh.push(key);
            }
        }

        if !refresh.is_empty() {
            if let Err(e) = self.backend.expire(&refresh, self.ttl).await {
                tracing::warn!(count = refresh.len(), error = %e, "cache ttl refresh failed");
            }
        }

        let hits = refresh.len() as u64;
        self.record(hits, content_hashes.len() as u64 - hits);
        found
    }

    /// Store many embeddings in one round-trip, skipping invalid vectors.
    pub async fn set_many(&self, items: &[(String, Vec<f32>)]) {
        let mut entries = Vec::with_capacity(items.len());
        for (hash, vector) in items {
            if !has_expected_dims(vector) {
                tracing::debug!(hash = %hash, dims = vector.len(), "not caching embedding");
                continue;
            }
            match serde_json::to_string(vector) {
                Ok(payload) => entries.push((cache_key(hash), payload)),
                Err(e) => tracing::warn!(hash = %hash, error = %e, "cannot encode embedding"),
            }
        }
        if entries.is_empty() {
            return;
        }
        if let Err(e) = self.backend.set_ex_many(&entries, self.ttl).await {
            tracing::warn!(count = entries.len(), error = %e, "cache batch set failed");
        }
    }

    /// Whether an entry exists. Does not touch the counters or the TTL.
    pub async fn has(&self, content_hash: &str) -> bool {
        self.backend
            .exists(&cache_key(content_hash))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(hash = content_hash, error = %e, "cache exists failed");
                false
            })
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn delete(&self, content_hash: &str) -> bool {
        self.delete_many(&[content_hash.to_string()]).await > 0
    }

    /// Remove many entries in one round-trip. Returns the number removed.
    pub async fn delete_many(&self, content_hashes: &[String]) -> u64 {
        if content_hashes.is_empty() {
            return 0;
        }
        let keys: Vec<String> = content_hashes.iter().map(|h| cache_key(h)).collect();
        self.backend.delete(&keys).await.unwrap_or_else(|e| {
            tracing::warn!(count = keys.len(), error = %e, "cache delete failed");
            0
        })
    }

    /// Approximate number of cached embeddings.
    pub async fn get_size(&self) -> u64 {
        self.backend
            .count_keys(&format!("{}*", KEY_PREFIX))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "cache size scan failed");
                0
            })
    }

    pub fn get_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
