//! # rootcause
//!
//! Root-cause analysis for production alerts: which recent change most
//! likely broke things?
//!
//! The pipeline splits a repository into semantically meaningful chunks,
//! embeds them (through a content-addressed Redis cache), stores them in
//! Postgres with pgvector, and when an alert fires, ranks candidate
//! commits by recency, semantic relevance and stack trace overlap.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────────┐
//! │ Repository │──▶│ Chunker  │──▶│ Embedding  │──▶│  Postgres +  │
//! │  crawler   │   │ (rayon)  │   │ cache      │   │  pgvector    │
//! └────────────┘   └──────────┘   │ (Redis)    │   └──────┬───────┘
//!                                 └────────────┘          │ search
//!                       ┌──────────┐                      ▼
//!                       │  Alert   │──────────────▶┌──────────────┐
//!                       │  (JSON)  │               │ Correlation  │
//!                       └──────────┘               │ scorer       │
//!                                                  └──────────────┘
//! ```
//!
//! The pure parts (chunking, cache logic, scoring) live in
//! `rootcause-core`; this crate adds the configuration, Postgres and
//! Redis adapters, and the `rca` commands.
//!
//! ## Quick Start
//!
//! ```bash
//! rca init                                  # create extension, table, indexes
//! rca index shop ./checkout --export todo.jsonl
//! rca embed import shop embedded.jsonl      # vectors from your provider
//! rca correlate alert.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Postgres connection pool |
//! | [`migrate`] | Schema migrations |
//! | [`pg_store`] | pgvector-backed chunk store |
//! | [`redis_cache`] | Redis-backed embedding cache backend |
//! | [`crawl`] | Repository file discovery |
//! | [`index_cmd`] | Chunking, storing and cache reconciliation |
//! | [`embed_cmd`] | Embedding import |
//! | [`alert`] | Alert file model |
//! | [`correlate_cmd`] | Search query and change correlation |
//! | [`stats`] | Index statistics and reset |

pub mod alert;
pub mod config;
pub mod correlate_cmd;
pub mod crawl;
pub mod db;
pub mod embed_cmd;
pub mod index_cmd;
pub mod migrate;
pub mod pg_store;
pub mod redis_cache;
pub mod stats;
