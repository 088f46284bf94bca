//! Template index - similarity-searchable storage of template records
//!
//! The index owns no business logic. Backends may partition records
//! internally (by document type), but lookup by id never requires the caller
//! to know the partition.

pub mod memory;

#[cfg(feature = "lance")]
pub mod lance;

pub use memory::InMemoryTemplateIndex;

#[cfg(feature = "lance")]
pub use lance::LanceTemplateIndex;

use async_trait::async_trait;

use crate::document::{Template, TemplateFilter};
use crate::error::Result;

/// Vector search capability over template records
#[async_trait]
pub trait TemplateIndex: Send + Sync {
    /// Persist a template keyed by its id
    async fn insert(&self, template: &Template) -> Result<()>;

    /// Exact lookup across every partition
    async fn fetch(&self, id: &str) -> Result<Option<Template>>;

    /// Up to `limit` nearest templates with cosine similarity scores
    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<(Template, f32)>>;

    /// Templates matching `filter`, in no particular order
    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<Template>>;

    /// Total number of indexed templates
    async fn count(&self) -> Result<usize>;
}
