//! In-memory [`ChunkStore`] implementation for testing.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Similarity search is
//! brute-force cosine similarity over every embedded chunk of the
//! repository; glob filters go through the same `LIKE` translation the
//! Postgres store binds.

use std::collections::BTreeSet;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::similarity;
use crate::models::{CodeChunk, PendingChunk, SimilarChunk};

use super::{
    generate_chunk_id, glob_to_like, like_matches, validate_batch, validate_chunk_id,
    validate_embedding, ChunkStore,
};

struct StoredChunk {
    id: String,
    repo_id: String,
    chunk: CodeChunk,
    embedding: Option<Vec<f32>>,
}

/// In-memory chunk store for tests.
pub struct InMemoryChunkStore {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
        }
    }

    fn search(
        &self,
        repo_id: &str,
        query: &[f32],
        like_patterns: &[String],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarChunk>> {
        validate_embedding(query)?;
        let stored = self.chunks.read().unwrap();
        let mut results: Vec<SimilarChunk> = stored
            .iter()
            .filter(|sc| sc.repo_id == repo_id)
            .filter(|sc| {
                like_patterns.is_empty()
                    || like_patterns
                        .iter()
                        .any(|p| like_matches(p, &sc.chunk.file_path))
            })
            .filter_map(|sc| {
                let embedding = sc.embedding.as_ref()?;
                let sim = similarity(query, embedding);
                (sim >= min_similarity).then(|| SimilarChunk {
                    id: sc.id.clone(),
                    repo_id: sc.repo_id.clone(),
                    file_path: sc.chunk.file_path.clone(),
                    start_line: sc.chunk.start_line,
                    end_line: sc.chunk.end_line,
                    content: sc.chunk.content.clone(),
                    language: sc.chunk.language.clone(),
                    chunk_type: sc.chunk.chunk_type,
                    similarity: sim,
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn replace_file_chunks(
        &self,
        repo_id: &str,
        file_path: &str,
        chunks: &[CodeChunk],
    ) -> Result<Vec<String>> {
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|sc| !(sc.repo_id == repo_id && sc.chunk.file_path == file_path));

        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = generate_chunk_id();
            stored.push(StoredChunk {
                id: id.clone(),
                repo_id: repo_id.to_string(),
                chunk: chunk.clone(),
                embedding: None,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn set_chunk_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        validate_chunk_id(id)?;
        validate_embedding(embedding)?;
        let mut stored = self.chunks.write().unwrap();
        if let Some(sc) = stored.iter_mut().find(|sc| sc.id == id) {
            sc.embedding = Some(embedding.to_vec());
        }
        Ok(())
    }

    async fn set_chunk_embeddings(&self, items: &[(String, Vec<f32>)]) -> Result<()> {
        validate_batch(items)?;
        let mut stored = self.chunks.write().unwrap();
        for (id, embedding) in items {
            if let Some(sc) = stored.iter_mut().find(|sc| &sc.id == id) {
                sc.embedding = Some(embedding.clone());
            }
        }
        Ok(())
    }

    async fn search_similar_chunks(
        &self,
        repo_id: &str,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarChunk>> {
        self.search(repo_id, query, &[], top_k, min_similarity)
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
    }

    async fn count_chunks_with_embeddings(&self, repo_id: &str) -> Result<u64> {
        let stored = self.chunks.read().unwrap();
        Ok(stored
            .iter()
            .filter(|sc| sc.repo_id == repo_id && sc.embedding.is_some())
            .count() as u64)
    }

    async fn clear_repository_embeddings(&self, repo_id: &str) -> Result<u64> {
        let mut stored = self.chunks.write().unwrap();
        let mut cleared = 0;
        for sc in stored.iter_mut().filter(|sc| sc.repo_id == repo_id) {
            if sc.embedding.take().is_some() {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn pending_chunks(&self, repo_id: &str) -> Result<Vec<PendingChunk>> {
        let stored = self.chunks.read().unwrap();
        Ok(stored
            .iter()
            .filter(|sc| sc.repo_id == repo_id && sc.embedding.is_none())
            .map(|sc| PendingChunk {
                id: sc.id.clone(),
                content_hash: sc.chunk.content_hash.clone(),
                content: sc.chunk.content.clone(),
            })
            .collect())
    }

    async fn content_hashes(&self, repo_id: &str) -> Result<Vec<String>> {
        let stored = self.chunks.read().unwrap();
        let hashes: BTreeSet<&str> = stored
            .iter()
            .filter(|sc| sc.repo_id == repo_id)
            .map(|sc| sc.chunk.content_hash.as_str())
            .collect();
        Ok(hashes.into_iter().map(String::from).collect())
    }
}
