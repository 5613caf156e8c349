//! Workspace umbrella crate for the translation-memory knowledge base (TMKB).
//!
//! This crate ties together the embedding client, the named-vector index and
//! the retriever. Callers give it a [`TmkbConfig`] and get back a
//! [`MemoryStack`] with every component sharing one availability flag.
//!
//! ```
//! use tmkb::{EmbeddingProvider, Language, MemoryEntry, MemoryStack, TmkbConfig};
//!
//! let mut config = TmkbConfig::default();
//! config.embedding.provider = EmbeddingProvider::Stub;
//! config.index.dimension = 32;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! rt.block_on(async {
//!     let stack = MemoryStack::build(&config).unwrap();
//!     assert!(stack.initialize().await);
//!
//!     stack
//!         .remember(MemoryEntry::new()
//!             .with_text(Language::Chinese, "早上好")
//!             .with_text(Language::English, "good morning"))
//!         .await
//!         .unwrap();
//!
//!     let hits = stack.lookup("早上好", Language::Chinese, Language::English, None).await.unwrap();
//!     assert_eq!(hits[0].target, "good morning");
//! });
//! ```

pub mod config;

pub use config::{
    ConfigLoadError, EmbeddingProvider, EmbeddingYamlConfig, IndexBackendKind, IndexYamlConfig,
    TmkbConfig, ENV_COLLECTION, ENV_EMBEDDING_MODEL, ENV_OLLAMA_URL, ENV_QDRANT_API_KEY,
    ENV_QDRANT_URL, ENV_VECTOR_DIM,
};
pub use index::{
    BackendConfig, CollectionSchema, Distance, InMemoryStore, IndexError, Language, Payload,
    PointId, QdrantConfig, QdrantStore, RawHit, RecordId, RetryConfig, SchemaCheck, VectorAvailability,
    VectorRecord, VectorStore, PRIMARY_FIELD, SECONDARY_FIELD,
};
pub use matcher::{
    classify, format_memory_context, recommended_threshold, KnowledgeBase, MatchError, MatchLabel,
    MemoryEntry, Retriever, RetrieverConfig, SimilarHit, SimilarityLevel, ThresholdTable,
    TranslationMemoryCandidate, UseCase,
};
pub use semantic::{
    cosine_similarity, Embedder, Embedding, EmbeddingConfig, OllamaEmbedder, SemanticError,
    StubEmbedder,
};

use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors raised while assembling a [`MemoryStack`].
#[derive(Debug, Error)]
pub enum StackError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("embedding setup failed: {0}")]
    Semantic(#[from] SemanticError),
    #[error("index setup failed: {0}")]
    Index(#[from] IndexError),
    #[error("retriever setup failed: {0}")]
    Match(#[from] MatchError),
}

/// Observer for stack-level operations.
pub trait StackMetrics: Send + Sync {
    fn record_lookup(&self, latency: Duration, candidates: usize);
    fn record_remember(&self, latency: Duration, stored: bool);
}

/// Install or clear the global stack metrics recorder.
pub fn set_stack_metrics(recorder: Option<Arc<dyn StackMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn StackMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn StackMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn StackMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Every component of the retrieval subsystem, wired to one availability flag.
#[derive(Clone)]
pub struct MemoryStack {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    availability: Arc<VectorAvailability>,
    schema: CollectionSchema,
    retriever: Arc<Retriever>,
    knowledge: Arc<KnowledgeBase>,
}

impl MemoryStack {
    /// Build the stack described by `config`. Nothing talks to the network
    /// until [`MemoryStack::initialize`].
    pub fn build(config: &TmkbConfig) -> Result<Self, StackError> {
        config.validate()?;

        let embedder: Arc<dyn Embedder> = match config.embedding.provider {
            EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(config.embedding_config())?),
            EmbeddingProvider::Stub => Arc::new(StubEmbedder::new(config.index.dimension)),
        };

        let availability = Arc::new(VectorAvailability::new());
        let schema = config.collection_schema();
        let store = config
            .backend_config()
            .build(schema.clone(), availability.clone())?;

        tracing::info!(
            embedder = embedder.model_name(),
            backend = store.backend_name(),
            collection = %schema.name,
            dimension = config.index.dimension,
            "memory stack assembled"
        );

        Self::from_parts(
            embedder,
            store,
            availability,
            schema,
            config.retriever.clone(),
            config.threshold_table(),
        )
    }

    /// Assemble from already-built components.
    pub fn from_parts(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        availability: Arc<VectorAvailability>,
        schema: CollectionSchema,
        retriever_config: RetrieverConfig,
        thresholds: ThresholdTable,
    ) -> Result<Self, StackError> {
        schema.validate()?;
        retriever_config.validate()?;
        thresholds.validate()?;

        let retriever = Retriever::new(embedder.clone(), store.clone(), availability.clone())
            .with_config(retriever_config.clone())
            .with_thresholds(Arc::new(thresholds));
        let knowledge = KnowledgeBase::new(embedder.clone(), store.clone(), availability.clone())
            .with_languages(
                retriever_config.primary_language,
                retriever_config.secondary_language,
            );

        Ok(Self {
            embedder,
            store,
            availability,
            schema,
            retriever: Arc::new(retriever),
            knowledge: Arc::new(knowledge),
        })
    }

    /// Ensure the collection exists with the configured schema. Returns
    /// whether the vector service is usable; on `false` the stack keeps
    /// working and every lookup returns no candidates.
    pub async fn initialize(&self) -> bool {
        let ok = self.store.ensure_collection(&self.schema).await;
        if ok {
            tracing::info!(collection = %self.schema.name, "vector collection ready");
        } else {
            tracing::warn!(
                collection = %self.schema.name,
                reason = self.availability.last_error().as_deref().unwrap_or("unknown"),
                "vector service unavailable, translation memory disabled"
            );
        }
        ok
    }

    /// Re-run collection setup while the service is down. No-op when up.
    pub async fn reprobe(&self) -> bool {
        if self.availability.is_available() {
            return true;
        }
        tracing::debug!(collection = %self.schema.name, "re-probing vector service");
        self.store.ensure_collection(&self.schema).await
    }

    /// Translation-memory lookup; `max_results` falls back to the configured default.
    pub async fn lookup(
        &self,
        text: &str,
        source_language: Language,
        target_language: Language,
        max_results: Option<usize>,
    ) -> Result<Vec<TranslationMemoryCandidate>, MatchError> {
        let start = Instant::now();
        let limit = max_results.unwrap_or(self.retriever.config().default_max_results);
        let out = self
            .retriever
            .get_translation_memory(text, source_language, target_language, limit)
            .await?;
        if let Some(recorder) = metrics_recorder() {
            recorder.record_lookup(start.elapsed(), out.len());
        }
        Ok(out)
    }

    pub async fn remember(&self, entry: MemoryEntry) -> Result<Option<RecordId>, MatchError> {
        let start = Instant::now();
        let out = self.knowledge.remember(entry).await;
        if let Some(recorder) = metrics_recorder() {
            recorder.record_remember(start.elapsed(), matches!(out, Ok(Some(_))));
        }
        out
    }

    pub async fn forget(&self, id: &str) -> bool {
        self.knowledge.forget(id).await
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn availability(&self) -> &Arc<VectorAvailability> {
        &self.availability
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        self.retriever.thresholds()
    }
}
