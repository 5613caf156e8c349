use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CollectionSchema, IndexError, RawHit, RecordId, VectorAvailability, VectorRecord};

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryStore;
pub use qdrant::{QdrantConfig, QdrantStore};

/// A named-vector collection store.
///
/// Apart from [`upsert`](Self::upsert), no method fails loudly: service
/// trouble is logged and reported as `false` or an empty hit list, so callers
/// on the read path never need to handle index errors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Make the live collection match `schema`: create it when absent,
    /// recreate it (dropping every record) when its fields drifted, and
    /// leave it alone otherwise. Transient failures are retried.
    async fn ensure_collection(&self, schema: &CollectionSchema) -> bool;

    /// Insert or replace one record, minting an id when none is set.
    async fn upsert(&self, record: VectorRecord) -> Result<RecordId, IndexError>;

    /// Nearest neighbours of `query` in vector field `field`, best first.
    async fn search(
        &self,
        field: &str,
        query: &[f32],
        limit: usize,
        with_payload: bool,
    ) -> Vec<RawHit>;

    /// Remove a record. Deleting an unknown id succeeds.
    async fn delete(&self, id: &str) -> bool;

    /// Short backend label for logs and readiness output.
    fn backend_name(&self) -> &'static str;
}

/// Selects and builds a [`VectorStore`].
///
/// ```
/// use index::BackendConfig;
///
/// let local = BackendConfig::in_memory();
/// let remote = BackendConfig::qdrant("http://localhost:6333");
/// # let _ = (local, remote);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Process-local brute-force store. Nothing survives a restart.
    #[default]
    InMemory,
    Qdrant(QdrantConfig),
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn qdrant(url: impl Into<String>) -> Self {
        BackendConfig::Qdrant(QdrantConfig::default().with_url(url))
    }

    /// Build the store. `schema` seeds lazy collection creation and
    /// `availability` is updated by the store as calls succeed or fail.
    pub fn build(
        &self,
        schema: CollectionSchema,
        availability: Arc<VectorAvailability>,
    ) -> Result<Arc<dyn VectorStore>, IndexError> {
        schema.validate()?;
        match self {
            BackendConfig::InMemory => Ok(Arc::new(
                InMemoryStore::new(schema).with_availability(availability),
            )),
            BackendConfig::Qdrant(cfg) => Ok(Arc::new(
                QdrantStore::new(cfg.clone(), schema)?.with_availability(availability),
            )),
        }
    }
}
