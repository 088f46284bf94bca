//! Web bootstrap - find a sample document on the web when the index has
//! nothing close enough to the user's request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DraftingError, Result};

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";
const EXA_NUM_RESULTS: usize = 3;
const EXA_MAX_CHARACTERS: usize = 10_000;

/// Raw text of a sample document found on the web
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapDocument {
    pub text: String,
    pub source_url: Option<String>,
}

/// Free-text web search for sample documents
#[async_trait]
pub trait WebBootstrap: Send + Sync {
    /// `None` when nothing usable was found
    async fn search(&self, free_text: &str) -> Result<Option<BootstrapDocument>>;
}

/// Bootstrap that never finds anything
pub struct NoBootstrap;

#[async_trait]
impl WebBootstrap for NoBootstrap {
    async fn search(&self, free_text: &str) -> Result<Option<BootstrapDocument>> {
        tracing::debug!("Web bootstrap disabled; skipping search for '{}'", free_text);
        Ok(None)
    }
}

/// Exa neural search with inline page contents
pub struct ExaBootstrap {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl ExaBootstrap {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, EXA_SEARCH_URL)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    fn query_for(free_text: &str) -> String {
        format!("downloadable sample legal template for a \"{}\"", free_text)
    }
}

#[async_trait]
impl WebBootstrap for ExaBootstrap {
    async fn search(&self, free_text: &str) -> Result<Option<BootstrapDocument>> {
        let request = ExaRequest {
            query: Self::query_for(free_text),
            num_results: EXA_NUM_RESULTS,
            contents: ExaContents {
                text: ExaTextOptions {
                    max_characters: EXA_MAX_CHARACTERS,
                },
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DraftingError::upstream("bootstrap", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DraftingError::upstream(
                "bootstrap",
                format!("search returned status {}", status),
            ));
        }

        let body: ExaResponse = response
            .json()
            .await
            .map_err(|e| DraftingError::upstream("bootstrap", e))?;

        Ok(first_with_text(body.results))
    }
}

fn first_with_text(results: Vec<ExaResult>) -> Option<BootstrapDocument> {
    results.into_iter().find_map(|result| match result.text {
        Some(text) if !text.trim().is_empty() => Some(BootstrapDocument {
            text,
            source_url: result.url,
        }),
        _ => None,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaRequest {
    query: String,
    num_results: usize,
    contents: ExaContents,
}

#[derive(Serialize)]
struct ExaContents {
    text: ExaTextOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaTextOptions {
    max_characters: usize,
}

#[derive(Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Deserialize)]
struct ExaResult {
    url: Option<String>,
    text: Option<String>,
}
