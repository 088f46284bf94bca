//! Application state for the Drafting API
//!
//! Wires the core components to concrete backends chosen by configuration.

use anyhow::Result;
use drafting_core::bootstrap::{ExaBootstrap, NoBootstrap, WebBootstrap};
use drafting_core::config::IndexBackend;
use drafting_core::embeddings::HttpEmbeddingProvider;
use drafting_core::index::InMemoryTemplateIndex;
use drafting_core::resolver::ResolverConfig;
use drafting_core::sessions::{InMemorySessionRepository, SqliteSessionRepository};
use drafting_core::understanding::{
    ContentUnderstanding, RemoteContentUnderstanding, UnavailableUnderstanding,
};
use drafting_core::{
    DraftWorkflow, DraftingConfig, EmbeddingProvider, RetrievalResolver, SessionRepository,
    SessionStore, TemplateIndex, TemplateStore,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
pub struct AppState {
    pub templates: Arc<TemplateStore>,
    pub sessions: Arc<SessionStore>,
    pub resolver: RetrievalResolver,
    pub workflow: DraftWorkflow,
}

impl AppState {
    /// Initialize application state from configuration
    pub async fn new(config: &DraftingConfig) -> Result<Self> {
        let embeddings: Arc<dyn EmbeddingProvider> =
            Arc::new(HttpEmbeddingProvider::from_config(&config.embedding));
        info!(
            "Using embedding model {} ({} dimensions)",
            config.embedding.model, config.embedding.dimension
        );

        let index = Self::template_index(config).await?;

        let sessions: Arc<dyn SessionRepository> = match &config.database_url {
            Some(url) => Arc::new(SqliteSessionRepository::connect(url).await?),
            None => {
                warn!("No session database configured; sessions are kept in memory");
                Arc::new(InMemorySessionRepository::new())
            }
        };

        let bootstrap: Arc<dyn WebBootstrap> = match &config.exa_api_key {
            Some(key) => Arc::new(ExaBootstrap::new(key)),
            None => {
                warn!("EXA_API_KEY not set; web bootstrap disabled");
                Arc::new(NoBootstrap)
            }
        };

        let understanding: Arc<dyn ContentUnderstanding> = match &config.understanding_url {
            Some(url) => Arc::new(RemoteContentUnderstanding::new(url)),
            None => Arc::new(UnavailableUnderstanding),
        };

        Ok(Self::from_parts(
            index,
            embeddings,
            sessions,
            bootstrap,
            understanding,
            config,
        ))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        index: Arc<dyn TemplateIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        sessions: Arc<dyn SessionRepository>,
        bootstrap: Arc<dyn WebBootstrap>,
        understanding: Arc<dyn ContentUnderstanding>,
        config: &DraftingConfig,
    ) -> Self {
        let templates = Arc::new(TemplateStore::with_timeout(
            index,
            embeddings,
            config.upstream_timeout,
        ));
        let sessions = Arc::new(SessionStore::with_merge_retries(
            sessions,
            templates.clone(),
            config.merge_retries,
        ));
        let resolver = RetrievalResolver::new(
            templates.clone(),
            bootstrap,
            understanding,
            ResolverConfig::from(config),
        );
        let workflow = DraftWorkflow::new(templates.clone(), sessions.clone());

        Self {
            templates,
            sessions,
            resolver,
            workflow,
        }
    }

    async fn template_index(config: &DraftingConfig) -> Result<Arc<dyn TemplateIndex>> {
        match &config.index_backend {
            IndexBackend::Memory => {
                warn!("Using in-memory template index; templates are lost on restart");
                Ok(Arc::new(InMemoryTemplateIndex::new()))
            }
            #[cfg(feature = "lance")]
            IndexBackend::Lance { uri } => {
                info!("Connecting to LanceDB at {}", uri);
                let index = drafting_core::index::LanceTemplateIndex::connect(
                    uri,
                    "templates",
                    config.embedding.dimension,
                )
                .await?;
                Ok(Arc::new(index))
            }
            #[cfg(not(feature = "lance"))]
            IndexBackend::Lance { .. } => Err(anyhow::anyhow!(
                "DRAFTING_INDEX_BACKEND=lance requires building with the `lance` feature"
            )),
        }
    }
}
