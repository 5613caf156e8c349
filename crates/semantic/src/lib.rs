//! TMKB Embedding Generation
//!
//! This crate turns a source string into a fixed-length vector. Everything that
//! needs an embedding (the retriever, knowledge-base writes, similarity search)
//! depends on the [`Embedder`] trait, never on a concrete provider.
//!
//! Two providers ship here:
//!
//! - [`OllamaEmbedder`] - calls `POST {ollama_url}/api/embeddings` with
//!   `{model, prompt}` and reads `{embedding: number[]}` back.
//! - [`StubEmbedder`] - deterministic hash-derived unit vectors. Handy for tests
//!   and for running the whole stack without an embedding service.
//!
//! Nothing here retries. A failed call surfaces as
//! [`SemanticError::EmbeddingService`] and the caller decides what to do; the
//! retriever swallows it, the knowledge-base writer drops the vector field.
//!
//! ## Quick example
//!
//! ```no_run
//! use semantic::{Embedder, EmbeddingConfig, OllamaEmbedder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cfg = EmbeddingConfig::default().with_model_name("bge-m3");
//!     let embedder = OllamaEmbedder::new(cfg).unwrap();
//!
//!     let vector = embedder.generate_embedding("机器学习是人工智能的一个分支").await.unwrap();
//!     println!("dim = {}", vector.len());
//! }
//! ```

pub mod config;
pub mod error;

mod api;
mod similarity;
mod stub;

use async_trait::async_trait;

pub use crate::api::OllamaEmbedder;
pub use crate::config::EmbeddingConfig;
pub use crate::error::SemanticError;
pub use crate::similarity::{cosine_similarity, l2_normalize_in_place};
pub use crate::stub::StubEmbedder;

/// A dense embedding vector.
pub type Embedding = Vec<f32>;

/// Text-to-vector provider.
///
/// Implementations must be cheap to share (`Arc<dyn Embedder>`) and safe to call
/// concurrently.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`. Fails with [`SemanticError::InvalidInput`] when `text` is blank
    /// after trimming, and with [`SemanticError::EmbeddingService`] on any remote failure.
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, SemanticError>;

    /// Model identifier, surfaced in logs and readiness output.
    fn model_name(&self) -> &str;
}
