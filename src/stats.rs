//! Repository index statistics and embedding reset.
//!
//! `rca stats` summarizes how much of a repository is embedded, broken
//! down by language, and how large the shared embedding cache is.
//! `rca clear` drops a repository's embeddings and its cache entries so
//! the next index run starts from scratch.

use anyhow::Result;
use sqlx::Row;

use rootcause_core::cache::{CacheBackend, EmbeddingCache};
use rootcause_core::store::ChunkStore;

use crate::config::Config;
use crate::db;
use crate::index_cmd::CACHE_BATCH_SIZE;
use crate::pg_store::PgChunkStore;
use crate::redis_cache;

/// Per-language breakdown of chunk counts.
struct LanguageStats {
    language: String,
    chunk_count: i64,
    embedded_count: i64,
}

pub async fn run_stats(config: &Config, repo_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = PgChunkStore::new(pool.clone());

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_chunks WHERE repo_id = $1")
        .bind(repo_id)
        .fetch_one(&pool)
        .await?;
    let total_files: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT file_path) FROM code_chunks WHERE repo_id = $1",
    )
    .bind(repo_id)
    .fetch_one(&pool)
    .await?;
    let total_embedded = store.count_chunks_with_embeddings(repo_id).await?;

    println!("rootcause index stats for '{}'", repo_id);
    println!("================================");
    println!();
    println!("  Files:       {}", total_files);
    println!("  Chunks:      {}", total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_chunks,
        coverage_percent(total_embedded, total_chunks as u64)
    );

    let rows = sqlx::query(
        r#"
        SELECT
            COALESCE(language, 'unknown') AS language,
            COUNT(*) AS chunk_count,
            COUNT(embedding) AS embedded_count
        FROM code_chunks
        WHERE repo_id = $1
        GROUP BY 1
        ORDER BY chunk_count DESC, language
        "#,
    )
    .bind(repo_id)
    .fetch_all(&pool)
    .await?;

    let languages: Vec<LanguageStats> = rows
        .iter()
        .map(|row| LanguageStats {
            language: row.get("language"),
            chunk_count: row.get("chunk_count"),
            embedded_count: row.get("embedded_count"),
        })
        .collect();

    if !languages.is_empty() {
        println!();
        println!("  By language:");
        println!("  {:<16} {:>8} {:>10}", "LANGUAGE", "CHUNKS", "EMBEDDED");
        println!("  {}", "-".repeat(36));
        for l in &languages {
            println!(
                "  {:<16} {:>8} {:>10}",
                l.language, l.chunk_count, l.embedded_count
            );
        }
    }

    println!();
    match redis_cache::open_cache(config).await {
        Some(cache) => println!("  Cache keys:  {} (approximate)", cache.get_size().await),
        None => println!("  Cache keys:  unavailable"),
    }
    println!();

    pool.close().await;
    Ok(())
}

pub async fn run_clear(config: &Config, repo_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = PgChunkStore::new(pool.clone());
    let cache = redis_cache::open_cache(config).await;

    let (invalidated, cleared) = clear_repository(&store, cache.as_ref(), repo_id).await?;

    println!("clear {}", repo_id);
    println!("  cache entries invalidated: {}", invalidated);
    println!("  embeddings cleared: {}", cleared);

    pool.close().await;
    Ok(())
}

/// Invalidate the cache entries of every content hash in `repo_id`, then
/// drop the repository's stored embeddings. Returns both counts.
///
/// Cache entries are shared by content, so identical code in another
/// repository loses its cached vector too.
pub async fn clear_repository<S, B>(
    store: &S,
    cache: Option<&EmbeddingCache<B>>,
    repo_id: &str,
) -> Result<(u64, u64)>
where
    S: ChunkStore + ?Sized,
    B: CacheBackend,
{
    let mut invalidated = 0;
    if let Some(cache) = cache {
        let hashes = store.content_hashes(repo_id).await?;
        for batch in hashes.chunks(CACHE_BATCH_SIZE) {
            invalidated += cache.delete_many(batch).await;
        }
    }
    let cleared = store.clear_repository_embeddings(repo_id).await?;
    Ok((invalidated, cleared))
}

fn coverage_percent(embedded: u64, total: u64) -> u64 {
    if total > 0 {
        (embedded * 100) / total
    } else {
        0
    }
}
