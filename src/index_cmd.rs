//! `rca chunk` and `rca index`: turn a repository into stored chunks and
//! satisfy as many embeddings as possible from the cache.
//!
//! Chunks whose content hash is not cached are exported as JSONL
//! (`{"content_hash", "content"}` per line) for an external embedding
//! provider; its output comes back through `rca embed import`.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use rootcause_core::cache::{CacheBackend, EmbeddingCache};
use rootcause_core::chunk::{chunk_code_with_limits, ChunkLimits};
use rootcause_core::models::{CodeChunk, PendingChunk};
use rootcause_core::store::ChunkStore;

use crate::config::Config;
use crate::crawl;
use crate::db;
use crate::pg_store::PgChunkStore;
use crate::redis_cache;

/// Keys per cache round trip.
pub(crate) const CACHE_BATCH_SIZE: usize = 500;
/// Embeddings per store transaction.
pub(crate) const STORE_BATCH_SIZE: usize = 100;

/// One line of the export file.
#[derive(Debug, Serialize)]
pub struct ExportRecord<'a> {
    pub content_hash: &'a str,
    pub content: &'a str,
}

/// Outcome of reconciling pending chunks with the cache.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CacheFill {
    /// Chunks that received a cached embedding.
    pub embedded: usize,
    /// One pending chunk per content hash that is still unembedded.
    pub misses: Vec<PendingChunk>,
}

pub fn run_chunk(path: &Path, language: Option<&str>, limits: &ChunkLimits) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_path = path.to_string_lossy().replace('\\', "/");
    let chunks = chunk_code_with_limits(&content, &file_path, language, limits);
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}

pub async fn run_index(
    config: &Config,
    repo_id: &str,
    root: &Path,
    export: Option<&Path>,
) -> Result<()> {
    let files = crawl::scan_repository(root, &config.index)?;
    let limits = config.chunking.limits();

    let chunked: Vec<(&str, Vec<CodeChunk>)> = files
        .par_iter()
        .map(|f| {
            let chunks = chunk_code_with_limits(&f.content, &f.path, None, &limits);
            (f.path.as_str(), chunks)
        })
        .collect();
    let total_chunks: usize = chunked.iter().map(|(_, chunks)| chunks.len()).sum();
    info!(repo_id, files = files.len(), chunks = total_chunks, "chunked repository");

    let pool = db::connect(config).await?;
    let store = PgChunkStore::new(pool.clone());

    for (path, chunks) in &chunked {
        store
            .replace_file_chunks(repo_id, path, chunks)
            .await
            .with_context(|| format!("Failed to store chunks of {}", path))?;
        debug!(file = %path, chunks = chunks.len(), "stored chunks");
    }

    let pending = store.pending_chunks(repo_id).await?;
    let cache = redis_cache::open_cache(config).await;
    let fill = fill_from_cache(&store, cache.as_ref(), &pending).await?;

    println!("index {}", repo_id);
    println!("  files: {}", files.len());
    println!("  chunks: {}", total_chunks);
    println!("  pending: {}", pending.len());
    println!("  embedded from cache: {}", fill.embedded);
    println!("  unique contents to embed: {}", fill.misses.len());

    match export {
        Some(path) => {
            write_export(path, &fill.misses)?;
            println!("  exported: {}", path.display());
        }
        None if !fill.misses.is_empty() => {
            println!("  (run with --export <file> to write them for embedding)");
        }
        None => {}
    }

    pool.close().await;
    Ok(())
}

/// Write cached embeddings for `pending` chunks into the store.
///
/// Without a cache nothing is embedded and every distinct content hash is
/// reported as a miss.
pub async fn fill_from_cache<S, B>(
    store: &S,
    cache: Option<&EmbeddingCache<B>>,
    pending: &[PendingChunk],
) -> Result<CacheFill>
where
    S: ChunkStore + ?Sized,
    B: CacheBackend,
{
    let mut hashes: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for chunk in pending {
        if seen.insert(chunk.content_hash.as_str()) {
            hashes.push(chunk.content_hash.clone());
        }
    }

    let mut cached = std::collections::HashMap::new();
    if let Some(cache) = cache {
        for batch in hashes.chunks(CACHE_BATCH_SIZE) {
            cached.extend(cache.get_many(batch).await);
        }
    }

    let items: Vec<(String, Vec<f32>)> = pending
        .iter()
        .filter_map(|chunk| {
            cached
                .get(&chunk.content_hash)
                .map(|v| (chunk.id.clone(), v.clone()))
        })
        .collect();
    for batch in items.chunks(STORE_BATCH_SIZE) {
        store.set_chunk_embeddings(batch).await?;
    }

    let mut reported = HashSet::new();
    let misses = pending
        .iter()
        .filter(|chunk| !cached.contains_key(&chunk.content_hash))
        .filter(|chunk| reported.insert(chunk.content_hash.as_str()))
        .cloned()
        .collect();

    Ok(CacheFill {
        embedded: items.len(),
        misses,
    })
}

pub fn write_export(path: &Path, misses: &[PendingChunk]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for chunk in misses {
        let record = ExportRecord {
            content_hash: &chunk.content_hash,
            content: &chunk.content,
        };
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
