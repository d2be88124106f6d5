use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use rootcause_core::cache::{CacheBackend, EmbeddingCache};
use rootcause_core::embedding::{has_expected_dims, EMBEDDING_DIMS};
use rootcause_core::store::ChunkStore;

use crate::config::Config;
use crate::db;
use crate::index_cmd::{CACHE_BATCH_SIZE, STORE_BATCH_SIZE};
use crate::pg_store::PgChunkStore;
use crate::redis_cache;

/// One line of an embedding provider's output.
#[derive(Debug, Deserialize)]
struct ImportRecord {
    content_hash: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub records: usize,
    pub cached: usize,
    pub embedded: usize,
    pub still_pending: usize,
}

/// Import embeddings computed for exported chunks.
pub async fn run_embed_import(config: &Config, repo_id: &str, path: &Path) -> Result<()> {
    let records = read_import(path)?;

    let pool = db::connect(config).await?;
    let store = PgChunkStore::new(pool.clone());
    let cache = redis_cache::open_cache(config).await;

    let summary = apply_import(&store, cache.as_ref(), repo_id, &records).await?;
    info!(repo_id, embedded = summary.embedded, "imported embeddings");

    println!("embed import {}", repo_id);
    println!("  records: {}", summary.records);
    println!("  cached: {}", summary.cached);
    println!("  chunks embedded: {}", summary.embedded);
    println!("  still pending: {}", summary.still_pending);

    pool.close().await;
    Ok(())
}

/// Parse a JSONL file of `{"content_hash", "embedding"}` records.
///
/// Blank lines are skipped. A malformed line or a vector of the wrong
/// length fails the whole import before anything is written.
pub fn read_import(path: &Path) -> Result<Vec<(String, Vec<f32>)>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open import file: {}", path.display()))?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let record: ImportRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), line_no))?;
        if !has_expected_dims(&record.embedding) {
            bail!(
                "{}:{}: embedding has {} dimensions, expected {}",
                path.display(),
                line_no,
                record.embedding.len(),
                EMBEDDING_DIMS
            );
        }
        records.push((record.content_hash, record.embedding));
    }
    Ok(records)
}

/// Cache the imported vectors and attach them to every pending chunk of
/// `repo_id` with a matching content hash.
pub async fn apply_import<S, B>(
    store: &S,
    cache: Option<&EmbeddingCache<B>>,
    repo_id: &str,
    records: &[(String, Vec<f32>)],
) -> Result<ImportSummary>
where
    S: ChunkStore + ?Sized,
    B: CacheBackend,
{
    let mut cached = 0;
    if let Some(cache) = cache {
        for batch in records.chunks(CACHE_BATCH_SIZE) {
            cache.set_many(batch).await;
        }
        cached = records.len();
    }

    let by_hash: HashMap<&str, &Vec<f32>> = records
        .iter()
        .map(|(hash, vector)| (hash.as_str(), vector))
        .collect();

    let pending = store.pending_chunks(repo_id).await?;
    let items: Vec<(String, Vec<f32>)> = pending
        .iter()
        .filter_map(|chunk| {
            by_hash
                .get(chunk.content_hash.as_str())
                .map(|v| (chunk.id.clone(), (*v).clone()))
        })
        .collect();
    for batch in items.chunks(STORE_BATCH_SIZE) {
        store.set_chunk_embeddings(batch).await?;
    }

    Ok(ImportSummary {
        records: records.len(),
        cached,
        embedded: items.len(),
        still_pending: pending.len() - items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcause_core::cache::memory::InMemoryCacheBackend;
    use rootcause_core::chunk::chunk_code;
    use rootcause_core::store::memory::InMemoryChunkStore;
    use std::io::Write;

    fn vector_json(value: f32) -> String {
        serde_json::to_string(&vec![value; EMBEDDING_DIMS]).unwrap()
    }

    #[test]
    fn test_read_import_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"content_hash":"h1","embedding":{}}}"#, vector_json(0.1)).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"content_hash":"h2","embedding":{}}}"#, vector_json(0.2)).unwrap();

        let records = read_import(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].0, "h2");
        assert_eq!(records[1].1.len(), EMBEDDING_DIMS);
    }

    #[test]
    fn test_read_import_rejects_wrong_dims() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"content_hash":"h1","embedding":[0.1,0.2]}}"#).unwrap();

        let err = read_import(file.path()).unwrap_err();
        assert!(err.to_string().contains(":1: embedding has 2 dimensions"));
    }

    #[test]
    fn test_read_import_reports_malformed_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"content_hash":"h1","embedding":{}}}"#, vector_json(0.1)).unwrap();
        writeln!(file, "not json").unwrap();

        let err = read_import(file.path()).unwrap_err();
        assert!(err.to_string().contains(":2: invalid record"));
    }

    #[tokio::test]
    async fn test_apply_import_fills_store_and_cache() {
        let store = InMemoryChunkStore::new();
        let a = chunk_code("def a():\n    return 1\n", "a.py", None);
        let b = chunk_code("def b():\n    return 2\n", "b.py", None);
        store.replace_file_chunks("repo", "a.py", &a).await.unwrap();
        store.replace_file_chunks("repo", "b.py", &b).await.unwrap();

        let cache = EmbeddingCache::new(InMemoryCacheBackend::new());
        let records = vec![(a[0].content_hash.clone(), vec![0.5; EMBEDDING_DIMS])];

        let summary = apply_import(&store, Some(&cache), "repo", &records)
            .await
            .unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                records: 1,
                cached: 1,
                embedded: 1,
                still_pending: 1,
            }
        );
        assert!(cache.has(&a[0].content_hash).await);
        assert_eq!(store.count_chunks_with_embeddings("repo").await.unwrap(), 1);
    }
}
