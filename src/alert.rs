//! Alert files: the input of `rca query` and `rca correlate`.
//!
//! ```json
//! {
//!   "repo_id": "checkout-service",
//!   "triggered_at": "2024-06-01T09:00:00Z",
//!   "errors": [{ "message": "...", "stack_trace": "...", "count": 12 }],
//!   "endpoints": ["/api/users"],
//!   "candidates": [{ "id": "abc123", "timestamp": "...", "files_changed": ["src/a.ts"] }],
//!   "query_embedding": [0.01, ...],
//!   "file_globs": ["src/**/*.ts"]
//! }
//! ```
//!
//! `query_embedding` is the provider's embedding of the text printed by
//! `rca query`. Without it, correlation runs on time and stack traces
//! only.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use rootcause_core::models::{Candidate, ErrorPattern};

#[derive(Debug, Clone, Deserialize)]
pub struct Alert {
    pub repo_id: String,
    pub triggered_at: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<ErrorPattern>,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub query_embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub file_globs: Vec<String>,
}

impl Alert {
    pub fn stack_traces(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().filter_map(|e| e.stack_trace.as_deref())
    }
}

pub fn load_alert(path: &Path) -> Result<Alert> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read alert file: {}", path.display()))?;
    let alert: Alert = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse alert file: {}", path.display()))?;
    Ok(alert)
}
