//! Postgres + pgvector backed [`ChunkStore`] implementation.
//!
//! Embeddings live in a `vector(1536)` column and similarity is
//! `1 - (embedding <=> query)`, the cosine distance operator. Vectors and
//! `LIKE` patterns are always bound as parameters.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::debug;

use rootcause_core::models::{CodeChunk, PendingChunk, SimilarChunk};
use rootcause_core::store::{
    generate_chunk_id, glob_to_like, validate_batch, validate_chunk_id, validate_embedding,
    ChunkStore,
};

/// Postgres implementation of the [`ChunkStore`] trait.
pub struct PgChunkStore {
    pool: PgPool,
}

impl PgChunkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn search(
        &self,
        repo_id: &str,
        query: &[f32],
        like_patterns: &[String],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarChunk>> {
        validate_embedding(query)?;

        let file_filter = if like_patterns.is_empty() {
            ""
        } else {
            "AND file_path LIKE ANY($5)"
        };
        let sql = format!(
            r#"
            SELECT id, repo_id, file_path, start_line, end_line, content, language, chunk_type,
                   1 - (embedding <=> $1) AS similarity
            FROM code_chunks
            WHERE repo_id = $2
              AND embedding IS NOT NULL
              AND 1 - (embedding <=> $1) >= $3
              {}
            ORDER BY embedding <=> $1 ASC
            LIMIT $4
            "#,
            file_filter
        );

        let mut q = sqlx::query(&sql)
            .bind(Vector::from(query.to_vec()))
            .bind(repo_id)
            .bind(min_similarity)
            .bind(i64::try_from(top_k).unwrap_or(i64::MAX));
        if !like_patterns.is_empty() {
            q = q.bind(like_patterns);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("similarity search failed for repo '{}'", repo_id))?;
        debug!(repo_id, results = rows.len(), "similarity search");

        rows.iter().map(row_to_similar_chunk).collect()
    }
}

fn row_to_similar_chunk(row: &PgRow) -> Result<SimilarChunk> {
    let start_line: i32 = row.get("start_line");
    let end_line: i32 = row.get("end_line");
    let chunk_type: String = row.get("chunk_type");
    Ok(SimilarChunk {
        id: row.get("id"),
        repo_id: row.get("repo_id"),
        file_path: row.get("file_path"),
        start_line: usize::try_from(start_line)?,
        end_line: usize::try_from(end_line)?,
        content: row.get("content"),
        language: row.get("language"),
        chunk_type: chunk_type.parse()?,
        similarity: row.get("similarity"),
    })
}

#[async_trait]
impl ChunkStore for PgChunkStore {
    async fn replace_file_chunks(
        &self,
        repo_id: &str,
        file_path: &str,
        chunks: &[CodeChunk],
    ) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM code_chunks WHERE repo_id = $1 AND file_path = $2")
            .bind(repo_id)
            .bind(file_path)
            .execute(&mut *tx)
            .await?;

        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = generate_chunk_id();
            sqlx::query(
                r#"
                INSERT INTO code_chunks (id, repo_id, file_path, start_line, end_line,
                                         content, content_hash, language, chunk_type)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(&id)
            .bind(repo_id)
            .bind(file_path)
            .bind(i32::try_from(chunk.start_line)?)
            .bind(i32::try_from(chunk.end_line)?)
            .bind(&chunk.content)
            .bind(&chunk.content_hash)
            .bind(&chunk.language)
            .bind(chunk.chunk_type.as_str())
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn set_chunk_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        validate_chunk_id(id)?;
        validate_embedding(embedding)?;

        sqlx::query("UPDATE code_chunks SET embedding = $1 WHERE id = $2")
            .bind(Vector::from(embedding.to_vec()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_chunk_embeddings(&self, items: &[(String, Vec<f32>)]) -> Result<()> {
        validate_batch(items)?;
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for (id, embedding) in items {
            sqlx::query("UPDATE code_chunks SET embedding = $1 WHERE id = $2")
                .bind(Vector::from(embedding.clone()))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search_similar_chunks(
        &self,
        repo_id: &str,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarChunk>> {
        self.search(repo_id, query, &[], top_k, min_similarity).await
    }

    async fn search_similar_chunks_with_patterns(
        &self,
        repo_id: &str,
        query: &[f32],
        globs: &[String],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarChunk>> {
        let patterns: Vec<String> = globs.iter().map(|g| glob_to_like(g)).collect();
        self.search(repo_id, query, &patterns, top_k, min_similarity)
            .await
    }

    async fn count_chunks_with_embeddings(&self, repo_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM code_chunks WHERE repo_id = $1 AND embedding IS NOT NULL",
        )
        .bind(repo_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn clear_repository_embeddings(&self, repo_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE code_chunks SET embedding = NULL WHERE repo_id = $1 AND embedding IS NOT NULL",
        )
        .bind(repo_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn pending_chunks(&self, repo_id: &str) -> Result<Vec<PendingChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content_hash, content
            FROM code_chunks
            WHERE repo_id = $1 AND embedding IS NULL
            ORDER BY file_path, start_line
            "#,
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PendingChunk {
                id: row.get("id"),
                content_hash: row.get("content_hash"),
                content: row.get("content"),
            })
            .collect())
    }

    async fn content_hashes(&self, repo_id: &str) -> Result<Vec<String>> {
        let hashes: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT content_hash FROM code_chunks WHERE repo_id = $1 ORDER BY content_hash",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(hashes)
    }
}
