//! Embedding vector constants and utilities.
//!
//! Every embedding handled by rootcause has exactly [`EMBEDDING_DIMS`]
//! components. The provider that produces them lives outside this
//! crate; these helpers only check shape and compare vectors.

/// Dimensionality of every stored or cached embedding.
pub const EMBEDDING_DIMS: usize = 1536;

/// Whether `vector` has the expected dimensionality.
///
/// Vectors of any other length are rejected by the store and dropped by
/// the cache. They are never truncated or padded.
pub fn has_expected_dims(vector: &[f32]) -> bool {
    vector.len() == EMBEDDING_DIMS
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// `1 - cosine_distance`, matching pgvector's `<=>` operator.
///
/// pgvector reports a distance of `NaN` for zero vectors; this returns
/// `0.0` instead so the value can be compared against thresholds.
pub fn similarity(a: &[f32], b: &[f32]) -> f64 {
    cosine_similarity(a, b) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_dims() {
        assert!(has_expected_dims(&vec![0.0; EMBEDDING_DIMS]));
        assert!(!has_expected_dims(&vec![0.0; 100]));
        assert!(!has_expected_dims(&[]));
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
