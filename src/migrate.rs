use anyhow::Result;
use rootcause_core::embedding::EMBEDDING_DIMS;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&pool)
        .await?;

    // One row per chunk; `embedding` stays NULL until a vector is written.
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS code_chunks (
            id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            language TEXT,
            chunk_type TEXT NOT NULL,
            embedding vector({dims}),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        dims = EMBEDDING_DIMS
    ))
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_code_chunks_repo_file ON code_chunks(repo_id, file_path)",
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_code_chunks_content_hash ON code_chunks(content_hash)",
    )
    .execute(&pool)
    .await?;

    // Approximate nearest neighbour index for cosine distance
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_code_chunks_embedding ON code_chunks USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
