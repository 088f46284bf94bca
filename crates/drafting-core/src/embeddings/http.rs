//! OpenAI-compatible embedding client.
//!
//! Works against any service exposing `POST {base_url}/embeddings` with the
//! OpenAI request/response shape (OpenAI, Ollama's compatibility layer,
//! vLLM, Gemini's OpenAI endpoint).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{DraftingError, Result};

/// Remote embedding provider over HTTP.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            dimension,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            &config.model,
            config.dimension,
        )
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimension,
            encoding_format: "float",
        };

        tracing::debug!(
            "Sending embedding request: url={}, model={}, text_len={}",
            url,
            self.model,
            text.len()
        );

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DraftingError::upstream("embedding", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DraftingError::upstream(
                "embedding",
                format!("provider returned status {}", status),
            ));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DraftingError::upstream("embedding", e))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DraftingError::upstream("embedding", "response contained no vectors"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}
