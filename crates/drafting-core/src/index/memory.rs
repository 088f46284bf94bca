//! In-process template index, partitioned by document type.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::TemplateIndex;
use crate::document::{Template, TemplateFilter};
use crate::error::Result;
use crate::search::{cosine_similarity, rank};

/// Brute-force cosine index held in memory
#[derive(Default)]
pub struct InMemoryTemplateIndex {
    /// partition -> id -> template
    partitions: RwLock<HashMap<String, HashMap<String, Template>>>,
}

impl InMemoryTemplateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the partitions currently holding templates
    pub async fn partitions(&self) -> Vec<String> {
        let partitions = self.partitions.read().await;
        let mut names: Vec<String> = partitions.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TemplateIndex for InMemoryTemplateIndex {
    async fn insert(&self, template: &Template) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(template.partition())
            .or_default()
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Template>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .values()
            .find_map(|records| records.get(id))
            .cloned())
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<(Template, f32)>> {
        let partitions = self.partitions.read().await;
        let scored = partitions
            .values()
            .flat_map(|records| records.values())
            .map(|t| (t.clone(), cosine_similarity(query, &t.embedding)))
            .collect();
        Ok(rank(scored, limit))
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .values()
            .flat_map(|records| records.values())
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let partitions = self.partitions.read().await;
        Ok(partitions.values().map(|records| records.len()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn template(id: &str, doc_type: &str, embedding: Vec<f32>) -> Template {
        Template {
            id: id.to_string(),
            title: id.to_string(),
            doc_type: doc_type.to_string(),
            jurisdiction: "IN".to_string(),
            description: String::new(),
            body: "body".to_string(),
            variables: vec![],
            similarity_tags: vec![],
            embedding,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fetch_searches_all_partitions() {
        let index = InMemoryTemplateIndex::new();
        index
            .insert(&template("a", "Insurance Notice", vec![1.0, 0.0]))
            .await
            .unwrap();
        index
            .insert(&template("b", "NDA", vec![0.0, 1.0]))
            .await
            .unwrap();

        assert_eq!(index.partitions().await, vec!["insurance-notice", "nda"]);
        assert_eq!(index.fetch("a").await.unwrap().unwrap().id, "a");
        assert_eq!(index.fetch("b").await.unwrap().unwrap().id, "b");
        assert!(index.fetch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nearest_spans_partitions() {
        let index = InMemoryTemplateIndex::new();
        index
            .insert(&template("a", "lease", vec![1.0, 0.0]))
            .await
            .unwrap();
        index
            .insert(&template("b", "nda", vec![0.7, 0.7]))
            .await
            .unwrap();

        let results = index.nearest(&[1.0, 0.1], 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "a");
        assert!(results[0].1 >= results[1].1);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let index = InMemoryTemplateIndex::new();
        index
            .insert(&template("a", "lease", vec![1.0]))
            .await
            .unwrap();
        index
            .insert(&template("b", "nda", vec![1.0]))
            .await
            .unwrap();

        let filter = TemplateFilter {
            doc_type: Some("lease".to_string()),
            jurisdiction: None,
        };
        let listed = index.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "a");
        assert_eq!(index.count().await.unwrap(), 2);
    }
}
