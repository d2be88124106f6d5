//! # rootcause core
//!
//! Shared, I/O-free logic for rootcause: data models, code chunking,
//! the embedding cache over an abstract backend, the chunk store trait,
//! and the change-correlation scorer.
//!
//! This crate contains no tokio, sqlx, redis, or filesystem I/O. The
//! native adapters (Postgres + pgvector store, Redis cache backend) live
//! in the `rootcause` app crate.
//!
//! ```text
//! files ──▶ chunk ──▶ cache ──▶ store ──▶ correlate
//!          CodeChunk  hash→vec  SimilarChunk  ScoredCandidate
//! ```

pub mod cache;
pub mod chunk;
pub mod correlate;
pub mod embedding;
pub mod hash;
pub mod language;
pub mod models;
pub mod store;
