//! Search module - Similarity scoring, ranking and acceptance gating
//!
//! This module provides:
//! - Cosine similarity over embedding vectors
//! - Deterministic ranking of scored templates
//! - Match classification by confidence
//! - Semantic threshold gating for the bootstrap fallback

pub mod gating;

pub use gating::SemanticGate;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::document::Template;

// Search confidence thresholds
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.85;
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.75;

/// Type of match based on confidence score or provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    DirectMatch,  // score >= 0.85
    SimilarMatch, // 0.75 <= score < 0.85
    WeakMatch,    // score < 0.75
    Bootstrap,    // freshly ingested, not rank-comparable
}

impl From<f32> for MatchType {
    fn from(score: f32) -> Self {
        if score >= HIGH_CONFIDENCE_THRESHOLD {
            MatchType::DirectMatch
        } else if score >= LOW_CONFIDENCE_THRESHOLD {
            MatchType::SimilarMatch
        } else {
            MatchType::WeakMatch
        }
    }
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector has no magnitude
/// or the dimensions differ
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

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Sort by descending score, newer templates first on ties, and keep `limit`
pub fn rank(mut results: Vec<(Template, f32)>, limit: usize) -> Vec<(Template, f32)> {
    results.sort_by(|(ta, sa), (tb, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| tb.created_at.cmp(&ta.created_at))
    });
    results.truncate(limit);
    results
}
