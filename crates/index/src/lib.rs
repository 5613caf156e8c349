//! # TMKB Index
//!
//! Client side of the translation-memory vector index. Records carry two named
//! vectors (`vector_cn` for Chinese source text, `vector_en` for everything
//! else) plus a payload mapping language names to texts.
//!
//! ## Core Features
//!
//! - **Pluggable Backends**: every store implements [`VectorStore`]. Out of the box:
//!   - [`QdrantStore`] talks to a Qdrant-compatible REST service.
//!   - [`InMemoryStore`] keeps everything in a `RwLock`ed map (tests, offline runs).
//! - **Collection Lifecycle**: [`VectorStore::ensure_collection`] creates a
//!   missing collection and destructively recreates one whose vector fields
//!   drifted from the expected [`CollectionSchema`].
//! - **Degrade, don't fail**: search and delete never return errors. Failures
//!   are logged by kind and reflected in a shared [`VectorAvailability`] flag.
//! - **Backoff**: [`with_retry`] retries transient failures with exponential delay.
//!
//! ## Example Usage
//!
//! ```
//! use index::{BackendConfig, CollectionSchema, Language, VectorAvailability, VectorRecord, PRIMARY_FIELD};
//! use std::sync::Arc;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let schema = CollectionSchema::translation_memory("translation_memory", 3);
//!     let availability = Arc::new(VectorAvailability::new());
//!     let store = BackendConfig::in_memory()
//!         .build(schema.clone(), availability.clone())
//!         .unwrap();
//!
//!     assert!(store.ensure_collection(&schema).await);
//!     assert!(availability.is_available());
//!
//!     let record = VectorRecord::new(Language::Chinese)
//!         .with_text(Language::Chinese, "机器学习")
//!         .with_text(Language::English, "machine learning")
//!         .with_vector(PRIMARY_FIELD, vec![0.6, 0.8, 0.0]);
//!     let id = store.upsert(record).await.unwrap();
//!
//!     let hits = store.search(PRIMARY_FIELD, &[0.6, 0.8, 0.0], 5, true).await;
//!     assert_eq!(hits[0].id, id);
//! });
//! ```

mod availability;
mod backend;
mod error;
pub mod retry;
mod schema;
mod types;

pub use availability::VectorAvailability;
pub use backend::{BackendConfig, InMemoryStore, QdrantConfig, QdrantStore, VectorStore};
pub use error::IndexError;
pub use retry::{with_retry, RetryConfig, RetryResult, Transient};
pub use schema::{CollectionSchema, Distance, SchemaCheck, VectorFieldSpec};
pub use types::{
    Language, ParseLanguageError, Payload, PointId, RawHit, RecordId, VectorRecord, PRIMARY_FIELD,
    SECONDARY_FIELD,
};
