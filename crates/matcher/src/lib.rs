//! # TMKB Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` sits on top of the embedding layer (`semantic`) and the vector
//! index client (`index`). It turns a source sentence into translation-memory
//! suggestions, applies the similarity threshold policy, and owns the write
//! path into the knowledge base.
//!
//! Translation-memory augmentation is strictly additive: when the embedding
//! service or the vector index misbehaves, the retriever logs and returns no
//! candidates instead of failing the translation that asked for them.
//!
//! ## Core Types
//!
//! - [`Retriever`]: `get_translation_memory`, its batch form, and
//!   thresholded `find_similar`.
//! - [`KnowledgeBase`]: `remember` / `forget` for stored pairs.
//! - [`ThresholdTable`]: same-language and cross-language tier cutoffs,
//!   use-case adjustment, and per-language unrelated floors. The free
//!   functions [`recommended_threshold`] and [`classify`] use the built-in table.
//! - [`format_memory_context`]: renders candidates for a translation prompt.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use index::{CollectionSchema, InMemoryStore, Language, VectorAvailability};
//! use matcher::{KnowledgeBase, MemoryEntry, Retriever};
//! use semantic::StubEmbedder;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let embedder = Arc::new(StubEmbedder::new(64));
//!     let store = Arc::new(InMemoryStore::new(CollectionSchema::translation_memory("tm", 64)));
//!     let availability = Arc::new(VectorAvailability::new());
//!     availability.mark_available();
//!
//!     let kb = KnowledgeBase::new(embedder.clone(), store.clone(), availability.clone());
//!     kb.remember(
//!         MemoryEntry::new()
//!             .with_text(Language::Chinese, "你好")
//!             .with_text(Language::English, "hello"),
//!     )
//!     .await
//!     .unwrap();
//!
//!     let retriever = Retriever::new(embedder, store, availability);
//!     let hits = retriever
//!         .get_translation_memory("你好", Language::Chinese, Language::English, 3)
//!         .await
//!         .unwrap();
//!     assert_eq!(hits[0].target, "hello");
//! });
//! ```

mod context;
mod knowledge;
pub mod retriever;
pub mod threshold;
pub mod types;

pub use crate::context::format_memory_context;
pub use crate::knowledge::KnowledgeBase;
pub use crate::retriever::Retriever;
pub use crate::threshold::{
    classify, recommended_threshold, MatchLabel, SimilarityLevel, ThresholdTable, TierCutoffs,
    UseCase, UseCaseCutoffs, BASELINE_THRESHOLD, DEFAULT_UNRELATED_FLOOR,
};
pub use crate::types::{
    MatchError, MemoryEntry, RetrieverConfig, SimilarHit, TranslationMemoryCandidate,
};
