//! Drafting Core - Template index and draft session store for legal document drafting
//!
//! This crate provides:
//! - Template, variable and draft session types
//! - Semantic template storage over a pluggable vector index
//! - Draft session storage with atomic answer merging (SQLite, in-memory)
//! - Template retrieval with web bootstrap fallback
//! - The question/answer drafting workflow
//! - Configuration management

pub mod bootstrap;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod questions;
pub mod render;
pub mod resolver;
pub mod search;
pub mod sessions;
pub mod templates;
pub mod understanding;
pub mod workflow;

// Re-export commonly used types
pub use config::DraftingConfig;
pub use document::{
    DraftSession, FilledValues, NewTemplate, SessionStatus, Template, TemplateFilter,
    TemplateSummary, VariableDefinition, VariableType,
};
pub use embeddings::EmbeddingProvider;
pub use error::{DraftingError, RecordKind, Result};
pub use index::TemplateIndex;
pub use resolver::{MatchCard, MatchReason, Resolution, RetrievalResolver};
pub use sessions::{SessionRepository, SessionStore};
pub use templates::TemplateStore;
pub use workflow::{DraftState, DraftWorkflow, SessionView, Submission};
