//! Semantic threshold gating for template retrieval
//!
//! Decides whether the best local match is good enough to hand back, or
//! whether the resolver should fall back to bootstrapping a new template:
//! - Score >= acceptance threshold: local match accepted
//! - Score below threshold, or no results: fall back to web bootstrap
//!
//! The default threshold is the low-confidence threshold (0.75); an
//! empty result set never counts as a match.

use crate::search::{MatchType, LOW_CONFIDENCE_THRESHOLD};

/// Acceptance gate for local search results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticGate {
    acceptance_threshold: f32,
}

impl SemanticGate {
    /// Create a gate with the default acceptance threshold
    pub fn new() -> Self {
        Self {
            acceptance_threshold: LOW_CONFIDENCE_THRESHOLD,
        }
    }

    /// Create a gate with a custom acceptance threshold
    pub fn with_threshold(acceptance_threshold: f32) -> Self {
        Self {
            acceptance_threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.acceptance_threshold
    }

    /// Whether the top score is good enough to return without bootstrapping
    pub fn accepts(&self, top_score: Option<f32>) -> bool {
        top_score.map_or(false, |score| score >= self.acceptance_threshold)
    }

    /// Classify a single local match
    pub fn classify(score: f32) -> MatchType {
        MatchType::from(score)
    }
}

impl Default for SemanticGate {
    fn default() -> Self {
        Self::new()
    }
}
