//! Template storage and semantic retrieval
//!
//! `TemplateStore` owns template identity and embedding. The underlying
//! `TemplateIndex` only stores and ranks vectors.

use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::document::{NewTemplate, Template, TemplateFilter, TemplateSummary};
use crate::embeddings::{check_embedding, EmbeddingProvider};
use crate::error::{with_timeout, DraftingError, Result};
use crate::index::TemplateIndex;
use crate::render::placeholders;

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// CRUD and similarity search over templates
pub struct TemplateStore {
    index: Arc<dyn TemplateIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    upstream_timeout: Duration,
}

impl TemplateStore {
    pub fn new(index: Arc<dyn TemplateIndex>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_timeout(index, embeddings, DEFAULT_UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(
        index: Arc<dyn TemplateIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            index,
            embeddings,
            upstream_timeout,
        }
    }

    /// Validate, embed and persist a new template
    ///
    /// Nothing is written unless a usable embedding was obtained.
    pub async fn create(&self, new: NewTemplate) -> Result<Template> {
        new.validate()?;

        let seed = new.seed_text();
        let embedding = self.embed(&seed).await?;

        let undefined: Vec<String> = placeholders(&new.body)
            .into_iter()
            .filter(|key| !new.variables.iter().any(|v| &v.key == key))
            .collect();
        if !undefined.is_empty() {
            tracing::warn!(
                "Template '{}' has placeholders without variables: {:?}",
                new.title,
                undefined
            );
        }

        let similarity_tags = new.normalized_tags();
        let template = Template {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            doc_type: new.doc_type,
            jurisdiction: new.jurisdiction,
            description: new.description,
            body: new.body,
            variables: new.variables,
            similarity_tags,
            embedding,
            // Microseconds survive every index backend unchanged
            created_at: Utc::now().trunc_subsecs(6),
        };

        with_timeout(
            "template index",
            self.upstream_timeout,
            self.index.insert(&template),
        )
        .await?;

        tracing::info!(
            "Created template {} ({}, partition {})",
            template.id,
            template.title,
            template.partition()
        );
        Ok(template)
    }

    /// Exact lookup by id, whatever partition the template lives in
    pub async fn get_by_id(&self, id: &str) -> Result<Template> {
        tracing::debug!("Fetching template {}", id);
        with_timeout("template index", self.upstream_timeout, self.index.fetch(id))
            .await?
            .ok_or_else(|| DraftingError::template_not_found(id))
    }

    /// Up to `k` templates by descending cosine similarity to `query`
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<(Template, f32)>> {
        if k == 0 {
            return Ok(vec![]);
        }

        let vector = self.embed(query).await?;
        let results = with_timeout(
            "template index",
            self.upstream_timeout,
            self.index.nearest(&vector, k),
        )
        .await?;

        tracing::debug!(
            "Search returned {} templates (top score {:?})",
            results.len(),
            results.first().map(|(_, score)| *score)
        );
        Ok(crate::search::rank(results, k))
    }

    /// Template summaries matching `filter`, newest first
    pub async fn list(&self, filter: &TemplateFilter) -> Result<Vec<TemplateSummary>> {
        let mut templates = with_timeout(
            "template index",
            self.upstream_timeout,
            self.index.list(filter),
        )
        .await?;
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(templates.iter().map(Template::summary).collect())
    }

    pub async fn count(&self) -> Result<usize> {
        with_timeout("template index", self.upstream_timeout, self.index.count()).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = with_timeout(
            "embedding",
            self.upstream_timeout,
            self.embeddings.embed(text),
        )
        .await?;
        check_embedding(&vector, self.embeddings.dimension())?;
        Ok(vector)
    }
}
