use serde::{Deserialize, Serialize};

/// Runtime configuration for the remote embedding endpoint.
///
/// # Example
/// ```
/// use semantic::EmbeddingConfig;
///
/// let cfg = EmbeddingConfig::default()
///     .with_ollama_url("http://ollama.internal:11434")
///     .with_model_name("bge-m3");
///
/// assert_eq!(cfg.endpoint(), "http://ollama.internal:11434/api/embeddings");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service (no trailing `/api/embeddings`).
    pub ollama_url: String,
    /// Model name sent with every request.
    pub model_name: String,
    /// Overall request timeout in seconds.
    pub timeout_secs: u64,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// L2-normalize returned vectors. The service usually returns normalized vectors already.
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".into(),
            model_name: "bge-m3".into(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            normalize: false,
        }
    }
}

impl EmbeddingConfig {
    pub fn with_ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_url = url.into();
        self
    }

    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Full URL of the embeddings route.
    pub fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.ollama_url.trim_end_matches('/'))
    }
}
