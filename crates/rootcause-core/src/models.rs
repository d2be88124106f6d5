//! Core data models shared by the chunker, cache, store, and scorer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic category of a [`CodeChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Module,
    Block,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Module => "module",
            ChunkType::Block => "block",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(ChunkType::Function),
            "class" => Ok(ChunkType::Class),
            "module" => Ok(ChunkType::Module),
            "block" => Ok(ChunkType::Block),
            other => anyhow::bail!("unknown chunk type: '{}'", other),
        }
    }
}

/// A contiguous, 1-based inclusive line range of one source file.
///
/// Produced by the chunker, never mutated afterwards. `content_hash` is
/// the SHA-256 hex digest of `content` (see [`crate::hash`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub content_hash: String,
    pub language: Option<String>,
    pub chunk_type: ChunkType,
}

impl CodeChunk {
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }
}

/// A stored chunk returned from similarity search, most similar first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarChunk {
    pub id: String,
    pub repo_id: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub language: Option<String>,
    pub chunk_type: ChunkType,
    /// `1 - cosine_distance`, in `[0, 1]` for the stored embeddings.
    pub similarity: f64,
}

/// A stored chunk that has no embedding yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChunk {
    pub id: String,
    pub content_hash: String,
    pub content: String,
}

/// A commit or pull request that may have caused an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub files_changed: Vec<String>,
}

/// An aggregated error reported by the alerting subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub message: String,
    #[serde(default)]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub count: u64,
}
