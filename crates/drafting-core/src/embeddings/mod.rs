//! Embedding provider boundary
//!
//! The core never computes embeddings itself; it calls an `EmbeddingProvider`
//! and refuses vectors that would poison similarity search.

pub mod http;

pub use http::HttpEmbeddingProvider;

use async_trait::async_trait;

use crate::error::{DraftingError, Result};

/// Converts text into a fixed-dimension vector.
///
/// Implementations fail with `UpstreamUnavailable`; they never substitute a
/// zero vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimension produced by this provider.
    fn dimension(&self) -> usize;
}

/// Reject vectors of the wrong size, non-finite values, or all zeros
pub fn check_embedding(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.len() != dimension {
        return Err(DraftingError::upstream(
            "embedding",
            format!("expected {} dimensions, got {}", dimension, vector.len()),
        ));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(DraftingError::upstream(
            "embedding",
            "vector contains non-finite values",
        ));
    }
    if vector.iter().all(|v| *v == 0.0) {
        return Err(DraftingError::upstream("embedding", "zero vector returned"));
    }
    Ok(())
}
