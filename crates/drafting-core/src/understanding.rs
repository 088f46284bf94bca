//! Content understanding - turn raw document text into template metadata
//! and a placeholder body. The analysis itself runs in an external service;
//! its output is trusted as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{NewTemplate, VariableDefinition};
use crate::error::{DraftingError, Result};

/// Structured result of analysing a raw document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderstoodDocument {
    pub title: String,
    pub doc_type: String,
    pub jurisdiction: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UnderstoodDocument {
    /// Creation payload seeded from the document's own metadata
    pub fn into_new_template(self) -> NewTemplate {
        let seed = NewTemplate::seed_text_for(&self.doc_type, &self.jurisdiction, &self.description);
        NewTemplate {
            title: self.title,
            doc_type: self.doc_type,
            jurisdiction: self.jurisdiction,
            description: self.description,
            body: self.body,
            variables: self.variables,
            tags: self.tags,
            embedding_seed_text: Some(seed),
        }
    }
}

#[async_trait]
pub trait ContentUnderstanding: Send + Sync {
    async fn understand(&self, raw_text: &str) -> Result<UnderstoodDocument>;
}

/// Understanding service reached over HTTP (`POST {url}` with `{"text": ...}`)
pub struct RemoteContentUnderstanding {
    client: reqwest::Client,
    url: String,
}

impl RemoteContentUnderstanding {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[derive(Serialize)]
struct UnderstandRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl ContentUnderstanding for RemoteContentUnderstanding {
    async fn understand(&self, raw_text: &str) -> Result<UnderstoodDocument> {
        tracing::debug!("Requesting understanding for {} chars", raw_text.len());

        let response = self
            .client
            .post(&self.url)
            .json(&UnderstandRequest { text: raw_text })
            .send()
            .await
            .map_err(|e| DraftingError::upstream("understanding", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DraftingError::upstream(
                "understanding",
                format!("service returned status {}", status),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DraftingError::upstream("understanding", e))
    }
}

/// Used when no understanding service is configured
pub struct UnavailableUnderstanding;

#[async_trait]
impl ContentUnderstanding for UnavailableUnderstanding {
    async fn understand(&self, _raw_text: &str) -> Result<UnderstoodDocument> {
        Err(DraftingError::upstream(
            "understanding",
            "no understanding service configured",
        ))
    }
}
