//! `rca query` and `rca correlate`.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use rootcause_core::correlate::{
    build_search_query, extract_paths_from_stack_traces, rank_candidates, CorrelationContext,
    ScoredCandidate,
};
use rootcause_core::embedding::{has_expected_dims, EMBEDDING_DIMS};
use rootcause_core::models::SimilarChunk;
use rootcause_core::store::ChunkStore;

use crate::alert::{load_alert, Alert};
use crate::config::Config;
use crate::db;
use crate::pg_store::PgChunkStore;

/// Location and score of a chunk that matched the alert.
#[derive(Debug, Serialize)]
pub struct ChunkMatch {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub similarity: f64,
}

#[derive(Debug, Serialize)]
pub struct CorrelationReport {
    pub repo_id: String,
    pub query: String,
    pub stack_paths: Vec<String>,
    pub relevant_chunks: Vec<ChunkMatch>,
    pub results: Vec<ScoredCandidate>,
}

pub fn run_query(config: &Config, alert_path: &Path) -> Result<()> {
    let alert = load_alert(alert_path)?;
    println!("{}", alert_query(config, &alert));
    Ok(())
}

pub async fn run_correlate(config: &Config, alert_path: &Path) -> Result<()> {
    let alert = load_alert(alert_path)?;

    let relevant_chunks = match &alert.query_embedding {
        Some(embedding) => {
            if !has_expected_dims(embedding) {
                bail!(
                    "query_embedding has {} dimensions, expected {}",
                    embedding.len(),
                    EMBEDDING_DIMS
                );
            }
            let pool = db::connect(config).await?;
            let store = PgChunkStore::new(pool.clone());
            let chunks = search(&store, config, &alert, embedding).await?;
            pool.close().await;
            chunks
        }
        None => {
            info!("alert has no query_embedding; semantic signal disabled");
            Vec::new()
        }
    };

    let report = build_report(config, &alert, relevant_chunks);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn alert_query(config: &Config, alert: &Alert) -> String {
    build_search_query(
        &alert.errors,
        &alert.endpoints,
        config.correlation.max_query_length,
    )
}

pub async fn search<S: ChunkStore + ?Sized>(
    store: &S,
    config: &Config,
    alert: &Alert,
    embedding: &[f32],
) -> Result<Vec<SimilarChunk>> {
    let top_k = config.search.top_k;
    let min_similarity = config.search.min_similarity;
    store
        .search_similar_chunks_with_patterns(
            &alert.repo_id,
            embedding,
            &alert.file_globs,
            top_k,
            min_similarity,
        )
        .await
}

/// Score the alert's candidates against the chunks found for it.
pub fn build_report(
    config: &Config,
    alert: &Alert,
    relevant_chunks: Vec<SimilarChunk>,
) -> CorrelationReport {
    let stack_paths = extract_paths_from_stack_traces(alert.stack_traces());
    let matches = relevant_chunks
        .iter()
        .map(|c| ChunkMatch {
            file_path: c.file_path.clone(),
            start_line: c.start_line,
            end_line: c.end_line,
            similarity: c.similarity,
        })
        .collect();

    let context = CorrelationContext {
        alert_time: alert.triggered_at,
        relevant_chunks,
        stack_paths: stack_paths.clone(),
    };
    let results = rank_candidates(
        &alert.candidates,
        &context,
        &config.correlation.scoring_params(),
    );
    info!(
        repo_id = %alert.repo_id,
        candidates = alert.candidates.len(),
        ranked = results.len(),
        "correlated alert"
    );

    CorrelationReport {
        repo_id: alert.repo_id.clone(),
        query: alert_query(config, alert),
        stack_paths,
        relevant_chunks: matches,
        results,
    }
}
