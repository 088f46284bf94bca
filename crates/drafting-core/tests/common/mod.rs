//! Shared fixtures for drafting-core integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drafting_core::bootstrap::{BootstrapDocument, WebBootstrap};
use drafting_core::understanding::{ContentUnderstanding, UnderstoodDocument};
use drafting_core::{
    DraftingError, EmbeddingProvider, NewTemplate, Result, TemplateStore, VariableDefinition,
    VariableType,
};
use drafting_core::index::InMemoryTemplateIndex;

pub const DIMENSION: usize = 64;

/// Deterministic bag-of-words embedding: each lower-cased word is hashed
/// (FNV-1a) into one of `DIMENSION` buckets. Identical texts embed
/// identically, so an exact query scores 1.0 against its own seed.
pub struct HashEmbedder;

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = (fnv1a(&word.to_lowercase()) % DIMENSION as u64) as usize;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Embedder whose upstream is down
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(DraftingError::upstream("embedding", "connection refused"))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Embedder that answers only after `delay`
pub struct SlowEmbedder {
    pub delay: Duration,
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        HashEmbedder.embed(text).await
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Web search that always returns the same page and counts calls
pub struct StaticBootstrap {
    pub text: String,
    pub calls: AtomicUsize,
}

impl StaticBootstrap {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebBootstrap for StaticBootstrap {
    async fn search(&self, _free_text: &str) -> Result<Option<BootstrapDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(BootstrapDocument {
            text: self.text.clone(),
            source_url: Some("https://templates.example.org/insurance-notice".to_string()),
        }))
    }
}

/// Understanding that always yields an insurance notice template
pub struct NoticeUnderstanding;

#[async_trait]
impl ContentUnderstanding for NoticeUnderstanding {
    async fn understand(&self, raw_text: &str) -> Result<UnderstoodDocument> {
        Ok(UnderstoodDocument {
            title: "Notice to insurer".to_string(),
            doc_type: "Insurance Notice".to_string(),
            jurisdiction: "IN".to_string(),
            description: "notice to insurer".to_string(),
            variables: vec![
                VariableDefinition::new("insurer", VariableType::Text)
                    .with_label("Insurer name"),
                VariableDefinition::new("policy_number", VariableType::Text),
            ],
            body: format!("{}\n\nTo {{{{insurer}}}}, policy {{{{policy_number}}}}", raw_text),
            tags: vec!["insurance".to_string(), "notice".to_string()],
        })
    }
}

pub fn template_store() -> Arc<TemplateStore> {
    Arc::new(TemplateStore::new(
        Arc::new(InMemoryTemplateIndex::new()),
        Arc::new(HashEmbedder),
    ))
}

pub fn notice_template() -> NewTemplate {
    NewTemplate {
        title: "Notice of claim".to_string(),
        doc_type: "Insurance Notice".to_string(),
        jurisdiction: "IN".to_string(),
        description: "notice of claim to an insurer".to_string(),
        body: "Dear {{recipient}}, notice dated {{date}}.".to_string(),
        variables: vec![
            VariableDefinition::new("recipient", VariableType::Text),
            VariableDefinition::new("date", VariableType::Date),
        ],
        tags: vec!["insurance".to_string()],
        embedding_seed_text: None,
    }
}

pub fn template_about(doc_type: &str, description: &str) -> NewTemplate {
    NewTemplate {
        title: format!("{} ({})", doc_type, description),
        doc_type: doc_type.to_string(),
        jurisdiction: "US".to_string(),
        description: description.to_string(),
        body: "{{party}} agrees.".to_string(),
        variables: vec![VariableDefinition::new("party", VariableType::Text)],
        tags: vec![],
        embedding_seed_text: None,
    }
}
