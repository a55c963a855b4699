//! Cosine similarity scoring and deterministic top-k ranking.

use std::cmp::Ordering;

use crate::error::{Result, RetrievalError};

/// Cosine similarity of two vectors. `None` when the dimensions differ.
///
/// Zero-norm vectors score `0.0` instead of producing `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a * norm_b))
}

/// One row of the query-by-documents similarity matrix.
///
/// Documents whose dimension does not match the query are skipped, so the output can be
/// shorter than `docs`; [`rank_scores`] turns that into [`RetrievalError::MissingSimilarity`].
pub fn similarity_row(query: &[f32], docs: &[Vec<f32>]) -> Vec<f32> {
    docs.iter()
        .filter_map(|doc| cosine_similarity(query, doc))
        .collect()
}

/// Ranks document vectors against `query`, returning `(index, score)` pairs.
pub fn rank(query: &[f32], docs: &[Vec<f32>], k: usize) -> Result<Vec<(usize, f32)>> {
    let scores = similarity_row(query, docs);
    rank_scores(&scores, docs.len(), k)
}

/// Orders precomputed scores descending, breaking ties by ascending index, and keeps the
/// first `min(k, expected)` entries.
pub fn rank_scores(scores: &[f32], expected: usize, k: usize) -> Result<Vec<(usize, f32)>> {
    if scores.len() != expected {
        return Err(RetrievalError::MissingSimilarity {
            expected,
            actual: scores.len(),
        });
    }
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    // sort_by is stable, so equal scores keep their ascending index order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(k.min(expected));
    Ok(ranked)
}
