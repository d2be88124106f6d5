//! Chunk storage abstraction for rootcause.
//!
//! The [`ChunkStore`] trait is the durable side of the pipeline: it keeps
//! each repository's chunks, their embeddings, and answers cosine
//! similarity queries. Backends: Postgres + pgvector in the app crate,
//! [`memory::InMemoryChunkStore`] here for tests.
//!
//! Input-shape violations (wrong embedding length, malformed chunk id)
//! are hard errors of type [`StoreError`]. Unlike the embedding cache,
//! the store never degrades silently.

pub mod memory;

use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::embedding::{has_expected_dims, EMBEDDING_DIMS};
use crate::models::{CodeChunk, PendingChunk, SimilarChunk};

/// Default number of results returned by similarity search.
pub const DEFAULT_TOP_K: usize = 10;

/// Default minimum similarity for a chunk to be returned.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.5;

static CHUNK_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^c[a-z0-9]{20,32}$").unwrap());

/// Validation failures raised before anything reaches the database.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("embedding has {actual} dimensions, expected {expected}")]
    InvalidDimensions { expected: usize, actual: usize },
    #[error("invalid chunk id: '{0}'")]
    InvalidChunkId(String),
}

/// Reject vectors that are not exactly [`EMBEDDING_DIMS`] long.
pub fn validate_embedding(vector: &[f32]) -> Result<(), StoreError> {
    if has_expected_dims(vector) {
        Ok(())
    } else {
        Err(StoreError::InvalidDimensions {
            expected: EMBEDDING_DIMS,
            actual: vector.len(),
        })
    }
}

/// Reject ids that are not CUID-shaped (`c` followed by 20 to 32
/// lowercase alphanumerics).
pub fn validate_chunk_id(id: &str) -> Result<(), StoreError> {
    if CHUNK_ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidChunkId(id.to_string()))
    }
}

/// New chunk id in the shape accepted by [`validate_chunk_id`].
pub fn generate_chunk_id() -> String {
    format!("c{}", uuid::Uuid::new_v4().simple())
}

/// Translate a file glob into a SQL `LIKE` pattern.
///
/// `**/` and `**` match any run of characters (so `src/**/*.ts` also
/// matches `src/a.ts`), `*` becomes `%` and `?` becomes `_`. Literal
/// `%`, `_` and `\` are escaped with `\`, the default `LIKE` escape.
pub fn glob_to_like(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 4);
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                    }
                }
                if !out.ends_with('%') || out.ends_with("\\%") {
                    out.push('%');
                }
            }
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Evaluate a `LIKE` pattern (as produced by [`glob_to_like`]) against
/// `text`. Used by stores without a SQL engine.
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // positions[j] == true: pattern prefix consumed so far matches text[..j]
    let mut positions = vec![false; text.len() + 1];
    positions[0] = true;

    let mut p = 0;
    while p < pattern.len() {
        let mut next = vec![false; text.len() + 1];
        match pattern[p] {
            '%' => {
                let mut reachable = false;
                for j in 0..=text.len() {
                    reachable |= positions[j];
                    next[j] = reachable;
                }
            }
            '_' => {
                for j in 0..text.len() {
                    next[j + 1] = positions[j];
                }
            }
            c => {
                let literal = if c == '\\' && p + 1 < pattern.len() {
                    p += 1;
                    pattern[p]
                } else {
                    c
                };
                for j in 0..text.len() {
                    next[j + 1] = positions[j] && text[j] == literal;
                }
            }
        }
        positions = next;
        p += 1;
    }

    positions[text.len()]
}

/// Abstract chunk storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_file_chunks`](ChunkStore::replace_file_chunks) | Supersede a file's chunks on re-index |
/// | [`set_chunk_embedding`](ChunkStore::set_chunk_embedding) | Store one embedding |
/// | [`set_chunk_embeddings`](ChunkStore::set_chunk_embeddings) | Store a batch of embeddings |
/// | [`search_similar_chunks`](ChunkStore::search_similar_chunks) | Cosine similarity search |
/// | [`search_similar_chunks_with_patterns`](ChunkStore::search_similar_chunks_with_patterns) | Similarity search restricted by file globs |
/// | [`count_chunks_with_embeddings`](ChunkStore::count_chunks_with_embeddings) | Indexing progress |
/// | [`clear_repository_embeddings`](ChunkStore::clear_repository_embeddings) | Reset a repository's embeddings |
/// | [`pending_chunks`](ChunkStore::pending_chunks) | Chunks still waiting for an embedding |
/// | [`content_hashes`](ChunkStore::content_hashes) | Hashes of a repository's chunks |
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Replace every chunk of `file_path` in `repo_id` with `chunks`.
    ///
    /// Returns the generated ids, in the order of `chunks`.
    async fn replace_file_chunks(
        &self,
        repo_id: &str,
        file_path: &str,
        chunks: &[CodeChunk],
    ) -> Result<Vec<String>>;

    /// Store the embedding of one chunk. Fails on a malformed id or a
    /// vector of the wrong length.
    async fn set_chunk_embedding(&self, id: &str, embedding: &[f32]) -> Result<()>;

    /// Store several embeddings in one batch. Every item is validated
    /// before anything is written.
    async fn set_chunk_embeddings(&self, items: &[(String, Vec<f32>)]) -> Result<()>;

    /// Chunks of `repo_id` with similarity `>= min_similarity` to
    /// `query`, most similar first, at most `top_k`.
    async fn search_similar_chunks(
        &self,
        repo_id: &str,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarChunk>>;

    /// Like [`search_similar_chunks`](ChunkStore::search_similar_chunks),
    /// restricted to files matching any of `globs`. An empty glob list
    /// applies no file restriction.
    async fn search_similar_chunks_with_patterns(
        &self,
        repo_id: &str,
        query: &[f32],
        globs: &[String],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarChunk>>;

    async fn count_chunks_with_embeddings(&self, repo_id: &str) -> Result<u64>;

    /// Drop the embeddings of every chunk in `repo_id`. Returns the
    /// number of chunks affected.
    async fn clear_repository_embeddings(&self, repo_id: &str) -> Result<u64>;

    async fn pending_chunks(&self, repo_id: &str) -> Result<Vec<PendingChunk>>;

    /// Distinct content hashes of `repo_id`'s chunks.
    async fn content_hashes(&self, repo_id: &str) -> Result<Vec<String>>;
}

/// Validate every item of an embedding batch.
pub fn validate_batch(items: &[(String, Vec<f32>)]) -> Result<(), StoreError> {
    for (id, embedding) in items {
        validate_chunk_id(id)?;
        validate_embedding(embedding)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&vec![0.1; EMBEDDING_DIMS]).is_ok());
        assert_eq!(
            validate_embedding(&[1.0; 3]),
            Err(StoreError::InvalidDimensions {
                expected: EMBEDDING_DIMS,
                actual: 3
            })
        );
    }

    #[test]
    fn test_validate_chunk_id() {
        assert!(validate_chunk_id("ckx1a2b3c4d5e6f7g8h9i0j1k").is_ok());
        assert!(validate_chunk_id(&generate_chunk_id()).is_ok());

        for bad in [
            "",
            "c123",
            "xkx1a2b3c4d5e6f7g8h9i0j1k",
            "cKX1A2B3C4D5E6F7G8H9I0J1K",
            "c1234567890123456789'; DROP TABLE code_chunks; --",
            "c1234567890123456789012345678901234",
        ] {
            assert!(validate_chunk_id(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_glob_to_like() {
        assert_eq!(glob_to_like("src/**/*.ts"), "src/%.ts");
        assert_eq!(glob_to_like("*.py"), "%.py");
        assert_eq!(glob_to_like("lib/?.go"), "lib/_.go");
        assert_eq!(glob_to_like("**"), "%");
        assert_eq!(glob_to_like("my_file%.rs"), "my\\_file\\%.rs");
        assert_eq!(glob_to_like("it's.ts"), "it's.ts");
    }

    #[test]
    fn test_like_matches() {
        let like = glob_to_like("src/**/*.ts");
        assert!(like_matches(&like, "src/a.ts"));
        assert!(like_matches(&like, "src/deep/nested/b.ts"));
        assert!(!like_matches(&like, "lib/a.ts"));
        assert!(!like_matches(&like, "src/a.tsx"));

        assert!(like_matches(&glob_to_like("lib/?.go"), "lib/x.go"));
        assert!(!like_matches(&glob_to_like("lib/?.go"), "lib/xy.go"));

        let escaped = glob_to_like("my_file.rs");
        assert!(like_matches(&escaped, "my_file.rs"));
        assert!(!like_matches(&escaped, "myXfile.rs"));
    }

    #[test]
    fn test_validate_batch_stops_at_first_error() {
        let items = vec![
            (generate_chunk_id(), vec![0.0; EMBEDDING_DIMS]),
            ("bad".to_string(), vec![0.0; EMBEDDING_DIMS]),
        ];
        assert_eq!(
            validate_batch(&items),
            Err(StoreError::InvalidChunkId("bad".into()))
        );
    }
}
