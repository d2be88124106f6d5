//! In-memory [`CacheBackend`] for tests.
//!
//! Entries live in a `HashMap` behind `std::sync::Mutex` with an
//! `Instant` deadline each; expired entries are treated as absent and
//! dropped lazily.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use super::CacheBackend;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local cache backend with expiry.
pub struct InMemoryCacheBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> Option<String> {
        if entries.get(key).is_some_and(|e| !e.live(now)) {
            entries.remove(key);
        }
        entries.get(key).map(|e| e.value.clone())
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        Ok(Self::lookup(&mut entries, key, Instant::now()))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|k| Self::lookup(&mut entries, k, now))
            .collect())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_ex_many(&self, items: &[(String, String)], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let expires_at = Instant::now() + ttl;
        for (key, value) in items {
            entries.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn expire(&self, keys: &[String], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        for key in keys {
            if let Some(entry) = entries.get_mut(key) {
                if entry.live(now) {
                    entry.expires_at = now + ttl;
                }
            }
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        Ok(Self::lookup(&mut entries, key, Instant::now()).is_some())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if entry.live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn count_keys(&self, pattern: &str) -> Result<u64> {
        let entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let matches = |key: &str| match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        };
        Ok(entries
            .iter()
            .filter(|(k, e)| e.live(now) && matches(k.as_str()))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expiry() {
        let backend = InMemoryCacheBackend::new();
        backend
            .set_ex("k", "v", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_count_keys_by_prefix() {
        let backend = InMemoryCacheBackend::new();
        let ttl = Duration::from_secs(60);
        backend
            .set_ex_many(
                &[
                    ("embedding:a".into(), "1".into()),
                    ("embedding:b".into(), "2".into()),
                    ("other:c".into(), "3".into()),
                ],
                ttl,
            )
            .await
            .unwrap();
        assert_eq!(backend.count_keys("embedding:*").await.unwrap(), 2);
        assert_eq!(backend.count_keys("other:c").await.unwrap(), 1);
        assert_eq!(
            backend
                .mget(&["embedding:a".into(), "missing".into()])
                .await
                .unwrap(),
            vec![Some("1".to_string()), None]
        );
    }
}
