use async_trait::async_trait;
use fxhash::hash64;

use crate::similarity::l2_normalize_in_place;
use crate::{Embedder, Embedding, SemanticError};

/// Deterministic, offline embedder.
///
/// Generates sinusoid values derived from a hash of the trimmed input, so identical
/// texts always map to identical unit vectors and distinct texts land far apart.
/// Used by tests and by deployments running without an embedding service.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    dimension: usize,
    model_name: String,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            model_name: "stub".into(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Synchronous variant used where no runtime is available (benches, fixtures).
    pub fn embed_sync(&self, text: &str) -> Result<Embedding, SemanticError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SemanticError::InvalidInput(
                "text must not be empty".into(),
            ));
        }

        let mut v = vec![0f32; self.dimension];
        let h = hash64(text.as_bytes());
        for (idx, value) in v.iter_mut().enumerate() {
            *value = ((h >> (idx % 32)) as f32 * 0.0001).sin();
        }
        l2_normalize_in_place(&mut v);
        Ok(v)
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(768)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, SemanticError> {
        self.embed_sync(text)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
