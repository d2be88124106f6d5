//! Change correlation: which recent commits or pull requests most likely
//! caused an alert.
//!
//! Three independent signals are computed per candidate change, each in
//! `[0, 1]`:
//!
//! | Signal | Source | Function |
//! |--------|--------|----------|
//! | temporal | how recent the change is | [`calculate_temporal_score`] |
//! | semantic | similarity of the changed files to the alert | [`calculate_semantic_score`] |
//! | path match | overlap with stack trace paths | [`calculate_path_match_score`] |
//!
//! and combined linearly by [`calculate_combined_score`]. Everything here
//! is pure and synchronous: empty input yields `0` and no function
//! panics.

mod query;
mod stack;

pub use query::{build_search_query, DEFAULT_MAX_QUERY_LENGTH};
pub use stack::extract_paths_from_stack_traces;

use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Candidate, SimilarChunk};

pub const DEFAULT_HALF_LIFE_DAYS: f64 = 3.0;
pub const DEFAULT_PARTIAL_PENALTY: f64 = 0.9;
pub const DEFAULT_FILENAME_CREDIT: f64 = 0.5;
pub const DEFAULT_MIN_SCORE: f64 = 0.2;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Per-candidate signal values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelationSignals {
    pub temporal: f64,
    pub semantic: f64,
    pub path_match: f64,
}

/// Signal weights. They must sum to `1.0`; [`calculate_combined_score`]
/// does not renormalize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub temporal: f64,
    pub semantic: f64,
    pub path_match: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            temporal: 0.3,
            semantic: 0.4,
            path_match: 0.3,
        }
    }
}

impl Weights {
    /// Check that every weight lies in `[0, 1]` and that they sum to
    /// `1.0` within `1e-6`.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("temporal", self.temporal),
            ("semantic", self.semantic),
            ("path_match", self.path_match),
        ] {
            if !(0.0..=1.0).contains(&w) {
                bail!("weight '{}' must be within [0, 1], got {}", name, w);
            }
        }
        let sum = self.temporal + self.semantic + self.path_match;
        if (sum - 1.0).abs() > 1e-6 {
            bail!("weights must sum to 1.0, got {}", sum);
        }
        Ok(())
    }
}

/// Tunable parameters of [`rank_candidates`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub half_life_days: f64,
    /// Multiplier for semantic matches found through a partial path match.
    pub partial_penalty: f64,
    /// Credit for a stack trace path matching a changed file by name only.
    pub filename_credit: f64,
    pub weights: Weights,
    /// Candidates scoring below this are dropped.
    pub min_score: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
            partial_penalty: DEFAULT_PARTIAL_PENALTY,
            filename_credit: DEFAULT_FILENAME_CREDIT,
            weights: Weights::default(),
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// Everything known about the alert when scoring candidates.
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    pub alert_time: DateTime<Utc>,
    /// Chunks returned by similarity search for the alert.
    pub relevant_chunks: Vec<SimilarChunk>,
    /// Paths from [`extract_paths_from_stack_traces`].
    pub stack_paths: Vec<String>,
}

/// A candidate with its signals and combined score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub signals: CorrelationSignals,
    pub combined_score: f64,
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Canonical form of a file path for comparisons.
///
/// Converts backslashes, strips `file://`, `webpack://` and `http(s)://host`
/// prefixes, drops `.` segments, empty segments and leading slashes.
pub fn normalize_path(path: &str) -> String {
    let mut p = path.trim().replace('\\', "/");

    for scheme in ["file://", "webpack://"] {
        if let Some(rest) = p.strip_prefix(scheme) {
            p = rest.to_string();
        }
    }
    for scheme in ["http://", "https://"] {
        if let Some(rest) = p.strip_prefix(scheme) {
            p = rest.split_once('/').map(|(_, r)| r).unwrap_or("").to_string();
        }
    }

    p.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn file_name(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}

/// Whether one normalized path ends with the other on a segment boundary
/// (`app/src/a.ts` and `src/a.ts`).
fn partial_path_match(a: &str, b: &str) -> bool {
    fn ends_with_segments(long: &str, short: &str) -> bool {
        long.len() > short.len()
            && long.ends_with(short)
            && long.as_bytes()[long.len() - short.len() - 1] == b'/'
    }
    !a.is_empty() && !b.is_empty() && (ends_with_segments(a, b) || ends_with_segments(b, a))
}

/// `exp(-days_ago / half_life_days)`, where `days_ago` is how long
/// before the alert the change happened.
///
/// Changes after the alert score `0`. A non-positive half-life also
/// scores `0`.
pub fn calculate_temporal_score(
    change_time: DateTime<Utc>,
    alert_time: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    if half_life_days.is_nan() || half_life_days <= 0.0 {
        return 0.0;
    }
    let days_ago = (alert_time - change_time).num_milliseconds() as f64 / MILLIS_PER_DAY;
    if days_ago < 0.0 {
        return 0.0;
    }
    clamp_unit((-days_ago / half_life_days).exp())
}

/// Strongest similarity between any changed file and the chunks that
/// matched the alert.
///
/// Per changed file: the best similarity among chunks of the same
/// normalized path, otherwise the best among chunks whose path matches
/// partially, multiplied by `partial_penalty`. The result is the maximum
/// over all changed files.
pub fn calculate_semantic_score(
    files_changed: &[String],
    relevant_chunks: &[SimilarChunk],
    partial_penalty: f64,
) -> f64 {
    if files_changed.is_empty() || relevant_chunks.is_empty() {
        return 0.0;
    }

    let mut by_path: HashMap<String, f64> = HashMap::new();
    for chunk in relevant_chunks {
        let entry = by_path.entry(normalize_path(&chunk.file_path)).or_insert(0.0);
        *entry = entry.max(chunk.similarity);
    }

    let mut best = 0.0f64;
    for file in files_changed {
        let file = normalize_path(file);
        let score = match by_path.get(&file) {
            Some(&exact) => exact,
            None => {
                by_path
                    .iter()
                    .filter(|(path, _)| partial_path_match(path, &file))
                    .map(|(_, &sim)| sim)
                    .fold(0.0, f64::max)
                    * partial_penalty
            }
        };
        best = best.max(score);
    }

    clamp_unit(best)
}

/// Share of stack trace paths touched by the change.
///
/// Each stack path scores `1` when a changed file has the same
/// normalized path, `filename_credit` when only the file name matches.
/// The total is divided by the number of stack paths and capped at `1`.
pub fn calculate_path_match_score(
    files_changed: &[String],
    stack_paths: &[String],
    filename_credit: f64,
) -> f64 {
    if files_changed.is_empty() || stack_paths.is_empty() {
        return 0.0;
    }

    let changed: Vec<String> = files_changed.iter().map(|f| normalize_path(f)).collect();
    let mut points = 0.0;
    for stack_path in stack_paths {
        let stack_path = normalize_path(stack_path);
        if changed.iter().any(|c| *c == stack_path) {
            points += 1.0;
        } else if changed
            .iter()
            .any(|c| !c.is_empty() && file_name(c) == file_name(&stack_path))
        {
            points += filename_credit;
        }
    }

    clamp_unit((points / stack_paths.len() as f64).min(1.0))
}

/// Weighted linear sum of the signals.
pub fn calculate_combined_score(signals: &CorrelationSignals, weights: &Weights) -> f64 {
    clamp_unit(
        signals.temporal * weights.temporal
            + signals.semantic * weights.semantic
            + signals.path_match * weights.path_match,
    )
}

/// Score every candidate, drop those under `params.min_score`, and sort
/// by descending combined score. Ties go to the newer change, then to
/// the smaller id.
pub fn rank_candidates(
    candidates: &[Candidate],
    context: &CorrelationContext,
    params: &ScoringParams,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|candidate| {
            let signals = CorrelationSignals {
                temporal: calculate_temporal_score(
                    candidate.timestamp,
                    context.alert_time,
                    params.half_life_days,
                ),
                semantic: calculate_semantic_score(
                    &candidate.files_changed,
                    &context.relevant_chunks,
                    params.partial_penalty,
                ),
                path_match: calculate_path_match_score(
                    &candidate.files_changed,
                    &context.stack_paths,
                    params.filename_credit,
                ),
            };
            let combined_score = calculate_combined_score(&signals, &params.weights);
            ScoredCandidate {
                candidate: candidate.clone(),
                signals,
                combined_score,
            }
        })
        .filter(|s| s.combined_score >= params.min_score)
        .collect();

    scored.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.candidate.timestamp.cmp(&a.candidate.timestamp))
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });
    scored
}
