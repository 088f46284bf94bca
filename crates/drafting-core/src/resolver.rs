//! Template resolution for a free-text drafting request
//!
//! Local semantic search is tried first. If the best local score does not
//! clear the acceptance gate, a sample document is fetched from the web,
//! turned into a template, ingested, and returned as the match.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::bootstrap::WebBootstrap;
use crate::config::{DraftingConfig, DEFAULT_BOOTSTRAP_SCORE};
use crate::document::Template;
use crate::error::{with_timeout, DraftingError, Result};
use crate::search::{MatchType, SemanticGate};
use crate::templates::TemplateStore;
use crate::understanding::ContentUnderstanding;

/// Why a template was offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    SemanticMatch,
    WebBootstrap,
}

/// Display metadata for one candidate template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCard {
    pub template_id: String,
    pub title: String,
    pub doc_type: String,
    pub jurisdiction: String,
    pub description: String,
    pub score: f32,
    pub match_type: MatchType,
    pub reason: MatchReason,
    pub similarity_tags: Vec<String>,
}

impl MatchCard {
    fn new(template: &Template, score: f32, match_type: MatchType, reason: MatchReason) -> Self {
        Self {
            template_id: template.id.clone(),
            title: template.title.clone(),
            doc_type: template.doc_type.clone(),
            jurisdiction: template.jurisdiction.clone(),
            description: template.description.clone(),
            score,
            match_type,
            reason,
            similarity_tags: template.similarity_tags.clone(),
        }
    }

    fn semantic(template: &Template, score: f32) -> Self {
        Self::new(
            template,
            score,
            SemanticGate::classify(score),
            MatchReason::SemanticMatch,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub top_match: MatchCard,
    pub alternatives: Vec<MatchCard>,
    /// Where a bootstrapped template was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    pub gate: SemanticGate,
    pub bootstrap_score: f32,
    pub search_k: usize,
    pub upstream_timeout: Duration,
    pub upstream_retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            gate: SemanticGate::new(),
            bootstrap_score: DEFAULT_BOOTSTRAP_SCORE,
            search_k: 3,
            upstream_timeout: Duration::from_secs(10),
            upstream_retries: 1,
        }
    }
}

impl From<&DraftingConfig> for ResolverConfig {
    fn from(config: &DraftingConfig) -> Self {
        Self {
            gate: SemanticGate::with_threshold(config.acceptance_threshold),
            bootstrap_score: config.bootstrap_score,
            search_k: config.search_k,
            upstream_timeout: config.upstream_timeout,
            upstream_retries: config.upstream_retries,
        }
    }
}

/// Runners-up returned beside an accepted local match
const MAX_ALTERNATIVES: usize = 2;

pub struct RetrievalResolver {
    templates: Arc<TemplateStore>,
    bootstrap: Arc<dyn WebBootstrap>,
    understanding: Arc<dyn ContentUnderstanding>,
    config: ResolverConfig,
}

impl RetrievalResolver {
    pub fn new(
        templates: Arc<TemplateStore>,
        bootstrap: Arc<dyn WebBootstrap>,
        understanding: Arc<dyn ContentUnderstanding>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            templates,
            bootstrap,
            understanding,
            config,
        }
    }

    /// Find the best template for `user_text`, bootstrapping one if needed
    pub async fn resolve(&self, user_text: &str) -> Result<Resolution> {
        let query = user_text.trim();
        if query.is_empty() {
            return Err(DraftingError::Validation(
                "drafting request must not be empty".to_string(),
            ));
        }

        let results = self.templates.search(query, self.config.search_k).await?;
        let top_score = results.first().map(|(_, score)| *score);

        if self.config.gate.accepts(top_score) {
            let mut cards = results
                .iter()
                .map(|(template, score)| MatchCard::semantic(template, *score));
            if let Some(top_match) = cards.next() {
                tracing::info!(
                    "Resolved '{}' to template {} (score {:.3})",
                    query,
                    top_match.template_id,
                    top_match.score
                );
                return Ok(Resolution {
                    top_match,
                    alternatives: cards.take(MAX_ALTERNATIVES).collect(),
                    source_url: None,
                });
            }
        }

        tracing::warn!(
            "No local template above {:.2} for '{}' (top score {:?}); bootstrapping",
            self.config.gate.threshold(),
            query,
            top_score
        );
        self.bootstrap(query).await
    }

    async fn bootstrap(&self, query: &str) -> Result<Resolution> {
        let document = self
            .with_retries("bootstrap", || self.bootstrap.search(query))
            .await?
            .ok_or_else(|| DraftingError::NoTemplateFound(query.to_string()))?;

        let template = self.understand_and_create(&document.text).await?;
        tracing::info!(
            "Bootstrapped template {} for '{}' from {:?}",
            template.id,
            query,
            document.source_url
        );

        Ok(Resolution {
            top_match: MatchCard::new(
                &template,
                self.config.bootstrap_score,
                MatchType::Bootstrap,
                MatchReason::WebBootstrap,
            ),
            alternatives: vec![],
            source_url: document.source_url,
        })
    }

    /// Analyse raw document text and store the result as a new template
    pub async fn ingest_text(&self, raw_text: &str) -> Result<Template> {
        if raw_text.trim().is_empty() {
            return Err(DraftingError::Validation(
                "document text must not be empty".to_string(),
            ));
        }

        let template = self.understand_and_create(raw_text).await?;
        tracing::info!(
            "Ingested template {} ({}) from {} chars of text",
            template.id,
            template.title,
            raw_text.len()
        );
        Ok(template)
    }

    async fn understand_and_create(&self, raw_text: &str) -> Result<Template> {
        let understood = self
            .with_retries("understanding", || self.understanding.understand(raw_text))
            .await?;
        self.templates.create(understood.into_new_template()).await
    }

    /// Timeout each attempt; retry only upstream failures, a bounded number of times
    async fn with_retries<T, F, Fut>(&self, service: &'static str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match with_timeout(service, self.config.upstream_timeout, call()).await {
                Err(e) if e.is_retryable() && attempt < self.config.upstream_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "{} failed ({}), retrying ({}/{})",
                        service,
                        e,
                        attempt,
                        self.config.upstream_retries
                    );
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{BootstrapDocument, NoBootstrap};
    use crate::embeddings::EmbeddingProvider;
    use crate::index::InMemoryTemplateIndex;
    use crate::understanding::UnderstoodDocument;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let text = text.to_lowercase();
            Ok(vec![
                if text.contains("lease") { 1.0 } else { 0.0 },
                if text.contains("insurance") { 1.0 } else { 0.0 },
                0.05,
            ])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    /// Fails `failures` times with an upstream error, then finds a document
    struct FlakyBootstrap {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl WebBootstrap for FlakyBootstrap {
        async fn search(&self, _free_text: &str) -> Result<Option<BootstrapDocument>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(DraftingError::upstream("bootstrap", "503"));
            }
            Ok(Some(BootstrapDocument {
                text: "Dear insurer".to_string(),
                source_url: Some("https://example.org/notice".to_string()),
            }))
        }
    }

    struct FixedUnderstanding;

    #[async_trait]
    impl ContentUnderstanding for FixedUnderstanding {
        async fn understand(&self, _raw_text: &str) -> Result<UnderstoodDocument> {
            Ok(UnderstoodDocument {
                title: "Notice to insurer".to_string(),
                doc_type: "Insurance Notice".to_string(),
                jurisdiction: "IN".to_string(),
                description: "insurance claim".to_string(),
                variables: vec![],
                body: "Dear {{insurer}}".to_string(),
                tags: vec![],
            })
        }
    }

    fn resolver(bootstrap: Arc<dyn WebBootstrap>) -> (Arc<TemplateStore>, RetrievalResolver) {
        let templates = Arc::new(TemplateStore::new(
            Arc::new(InMemoryTemplateIndex::new()),
            Arc::new(AxisEmbedder),
        ));
        let resolver = RetrievalResolver::new(
            templates.clone(),
            bootstrap,
            Arc::new(FixedUnderstanding),
            ResolverConfig::default(),
        );
        (templates, resolver)
    }

    #[tokio::test]
    async fn test_retries_bootstrap_once() {
        let bootstrap = Arc::new(FlakyBootstrap {
            failures: 1,
            calls: AtomicU32::new(0),
        });
        let (templates, resolver) = resolver(bootstrap.clone());

        let resolution = resolver.resolve("insurance notice").await.unwrap();
        assert_eq!(resolution.top_match.reason, MatchReason::WebBootstrap);
        assert_eq!(resolution.top_match.match_type, MatchType::Bootstrap);
        assert_eq!(resolution.top_match.score, 0.95);
        assert!(resolution.alternatives.is_empty());
        assert_eq!(bootstrap.calls.load(Ordering::SeqCst), 2);

        // Identity is stable: the bootstrapped id resolves locally
        templates
            .get_by_id(&resolution.top_match.template_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let bootstrap = Arc::new(FlakyBootstrap {
            failures: 5,
            calls: AtomicU32::new(0),
        });
        let (templates, resolver) = resolver(bootstrap.clone());

        let result = resolver.resolve("insurance notice").await;
        assert!(matches!(
            result,
            Err(DraftingError::UpstreamUnavailable { .. })
        ));
        assert_eq!(bootstrap.calls.load(Ordering::SeqCst), 2);
        assert_eq!(templates.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let (_, resolver) = resolver(Arc::new(NoBootstrap));
        assert!(matches!(
            resolver.resolve("lease").await,
            Err(DraftingError::NoTemplateFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let (_, resolver) = resolver(Arc::new(NoBootstrap));
        assert!(matches!(
            resolver.resolve("  ").await,
            Err(DraftingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_ingest_text_creates_template() {
        let (templates, resolver) = resolver(Arc::new(NoBootstrap));

        let template = resolver
            .ingest_text("Dear insurer, we write to notify you of a claim.")
            .await
            .unwrap();
        assert_eq!(template.doc_type, "Insurance Notice");
        assert_eq!(templates.get_by_id(&template.id).await.unwrap(), template);

        // The stored template is now found locally
        let resolution = resolver.resolve("insurance notice").await.unwrap();
        assert_eq!(resolution.top_match.template_id, template.id);
        assert_eq!(resolution.top_match.reason, MatchReason::SemanticMatch);
    }

    #[tokio::test]
    async fn test_ingest_empty_text_rejected() {
        let (templates, resolver) = resolver(Arc::new(NoBootstrap));
        assert!(matches!(
            resolver.ingest_text("\n ").await,
            Err(DraftingError::Validation(_))
        ));
        assert_eq!(templates.count().await.unwrap(), 0);
    }
}
