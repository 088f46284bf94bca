//! Configuration management for the drafting system
//!
//! Everything is read from environment variables. Unset variables fall back
//! to defaults; set-but-invalid variables are an error naming the variable.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::search::LOW_CONFIDENCE_THRESHOLD;

/// Provisional score given to a freshly bootstrapped template
pub const DEFAULT_BOOTSTRAP_SCORE: f32 = 0.95;

/// Which template index backend to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBackend {
    /// In-process index; contents are lost on restart
    Memory,
    /// LanceDB table at `uri` (local path or `s3://bucket`)
    Lance { uri: String },
}

/// OpenAI-compatible embedding endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimension: 768,
        }
    }
}

/// Runtime configuration for the template and session stores
#[derive(Debug, Clone, PartialEq)]
pub struct DraftingConfig {
    /// Minimum top score for a local match to be accepted
    pub acceptance_threshold: f32,
    /// Score reported for bootstrapped templates
    pub bootstrap_score: f32,
    /// Candidates fetched per resolution
    pub search_k: usize,
    pub upstream_timeout: Duration,
    /// Extra attempts for bootstrap and understanding calls
    pub upstream_retries: u32,
    /// Compare-and-set attempts per merge before giving up
    pub merge_retries: u32,
    pub index_backend: IndexBackend,
    /// SQLite URL; `None` keeps sessions in memory
    pub database_url: Option<String>,
    pub embedding: EmbeddingConfig,
    /// Web bootstrap is disabled when absent
    pub exa_api_key: Option<String>,
    pub understanding_url: Option<String>,
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: LOW_CONFIDENCE_THRESHOLD,
            bootstrap_score: DEFAULT_BOOTSTRAP_SCORE,
            search_k: 3,
            upstream_timeout: Duration::from_secs(10),
            upstream_retries: 1,
            merge_retries: 8,
            index_backend: IndexBackend::Memory,
            database_url: None,
            embedding: EmbeddingConfig::default(),
            exa_api_key: None,
            understanding_url: None,
        }
    }
}

impl DraftingConfig {
    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - DRAFTING_ACCEPTANCE_THRESHOLD: local match cutoff (default: 0.75)
    /// - DRAFTING_BOOTSTRAP_SCORE: score for bootstrapped templates (default: 0.95)
    /// - DRAFTING_SEARCH_K: candidates per resolution (default: 3)
    /// - DRAFTING_UPSTREAM_TIMEOUT_SECS: per-call timeout (default: 10)
    /// - DRAFTING_UPSTREAM_RETRIES: extra bootstrap attempts (default: 1)
    /// - DRAFTING_MERGE_RETRIES: CAS attempts per merge (default: 8)
    /// - DRAFTING_INDEX_BACKEND: "memory" or "lance" (default: "memory")
    /// - DRAFTING_LANCE_URI: LanceDB location (default: platform data dir)
    /// - DATABASE_URL: SQLite URL; "memory" keeps sessions in process
    /// - EMBEDDING_BASE_URL, EMBEDDING_API_KEY, EMBEDDING_MODEL, EMBEDDING_DIMENSION
    /// - EXA_API_KEY: enables web bootstrap
    /// - UNDERSTANDING_URL: content understanding service
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let acceptance_threshold = parse_var(
            &var,
            "DRAFTING_ACCEPTANCE_THRESHOLD",
            defaults.acceptance_threshold,
        )?;
        if !(-1.0..=1.0).contains(&acceptance_threshold) {
            return Err(anyhow!(
                "DRAFTING_ACCEPTANCE_THRESHOLD must be within [-1, 1], got {}",
                acceptance_threshold
            ));
        }

        let bootstrap_score =
            parse_var(&var, "DRAFTING_BOOTSTRAP_SCORE", defaults.bootstrap_score)?;
        let search_k = parse_var(&var, "DRAFTING_SEARCH_K", defaults.search_k)?;
        let timeout_secs = parse_var(
            &var,
            "DRAFTING_UPSTREAM_TIMEOUT_SECS",
            defaults.upstream_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(anyhow!("DRAFTING_UPSTREAM_TIMEOUT_SECS must be positive"));
        }
        let upstream_retries =
            parse_var(&var, "DRAFTING_UPSTREAM_RETRIES", defaults.upstream_retries)?;
        let merge_retries = parse_var(&var, "DRAFTING_MERGE_RETRIES", defaults.merge_retries)?;
        if merge_retries == 0 {
            return Err(anyhow!("DRAFTING_MERGE_RETRIES must be at least 1"));
        }

        let backend = var("DRAFTING_INDEX_BACKEND").unwrap_or_else(|| "memory".to_string());
        let index_backend = match backend.to_lowercase().as_str() {
            "memory" => IndexBackend::Memory,
            "lance" | "lancedb" => IndexBackend::Lance {
                uri: var("DRAFTING_LANCE_URI").unwrap_or_else(default_lance_uri),
            },
            _ => return Err(anyhow!("Unknown DRAFTING_INDEX_BACKEND: {}", backend)),
        };

        let database_url = match var("DATABASE_URL") {
            Some(url) if url.eq_ignore_ascii_case("memory") => None,
            Some(url) => Some(url),
            None => Some(default_database_url()),
        };

        let embedding = EmbeddingConfig {
            base_url: var("EMBEDDING_BASE_URL").unwrap_or(defaults.embedding.base_url),
            api_key: var("EMBEDDING_API_KEY"),
            model: var("EMBEDDING_MODEL").unwrap_or(defaults.embedding.model),
            dimension: parse_var(&var, "EMBEDDING_DIMENSION", defaults.embedding.dimension)?,
        };
        if embedding.dimension == 0 {
            return Err(anyhow!("EMBEDDING_DIMENSION must be positive"));
        }

        Ok(Self {
            acceptance_threshold,
            bootstrap_score,
            search_k,
            upstream_timeout: Duration::from_secs(timeout_secs),
            upstream_retries,
            merge_retries,
            index_backend,
            database_url,
            embedding,
            exa_api_key: var("EXA_API_KEY"),
            understanding_url: var("UNDERSTANDING_URL"),
        })
    }
}

fn parse_var<T, F>(var: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}='{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

/// `sqlite:` URL for the sessions database in the platform data directory
pub fn default_database_url() -> String {
    format!("sqlite:{}?mode=rwc", data_dir().join("sessions.db").display())
}

fn default_lance_uri() -> String {
    data_dir().join("templates.lance").display().to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drafting")
}
