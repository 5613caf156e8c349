use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::similarity::l2_normalize_in_place;
use crate::{Embedder, Embedding, EmbeddingConfig, SemanticError};

/// Embedder backed by an Ollama-compatible `POST /api/embeddings` endpoint.
///
/// One instance owns one pooled `reqwest::Client`; construct it once at startup
/// and share it behind an `Arc`. No retries happen here.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    cfg: EmbeddingConfig,
}

impl OllamaEmbedder {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self, SemanticError> {
        if cfg.ollama_url.trim().is_empty() {
            return Err(SemanticError::InvalidConfig(
                "ollama_url is required".into(),
            ));
        }
        if cfg.model_name.trim().is_empty() {
            return Err(SemanticError::InvalidConfig(
                "model_name is required".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| SemanticError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, cfg))
    }

    /// Reuse an existing pooled client.
    pub fn with_client(client: reqwest::Client, cfg: EmbeddingConfig) -> Self {
        Self {
            client,
            endpoint: cfg.endpoint(),
            cfg,
        }
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.cfg
    }

    async fn send_request(&self, prompt: &str) -> Result<Value, SemanticError> {
        let payload = json!({ "model": self.cfg.model_name, "prompt": prompt });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SemanticError::EmbeddingService(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SemanticError::EmbeddingService(format!(
                "HTTP error {status}: {body}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SemanticError::EmbeddingService(format!("invalid JSON response: {e}")))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, SemanticError> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(SemanticError::InvalidInput(
                "text must not be empty".into(),
            ));
        }

        let response = self.send_request(prompt).await?;
        let mut embedding = parse_embedding_response(response)?;

        if self.cfg.normalize {
            l2_normalize_in_place(&mut embedding);
        }

        tracing::debug!(
            model = %self.cfg.model_name,
            dim = embedding.len(),
            chars = prompt.chars().count(),
            "generated embedding"
        );

        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.cfg.model_name
    }
}

/// Extract the `embedding` array from an Ollama response body.
fn parse_embedding_response(value: Value) -> Result<Embedding, SemanticError> {
    match value {
        Value::Object(mut map) => match map.remove("embedding") {
            Some(embedding) => {
                let vector = parse_embedding_vector(embedding)?;
                if vector.is_empty() {
                    return Err(SemanticError::EmbeddingService(
                        "response contained an empty embedding".into(),
                    ));
                }
                Ok(vector)
            }
            None => Err(SemanticError::EmbeddingService(
                "response is missing the `embedding` field".into(),
            )),
        },
        other => Err(SemanticError::EmbeddingService(format!(
            "unsupported response shape: {other}"
        ))),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Embedding, SemanticError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| match entry {
                Value::Number(num) => num.as_f64().map(|f| f as f32).ok_or_else(|| {
                    SemanticError::EmbeddingService("non-finite embedding value".into())
                }),
                other => Err(SemanticError::EmbeddingService(format!(
                    "embedding entries must be numbers, got {other}"
                ))),
            })
            .collect(),
        other => Err(SemanticError::EmbeddingService(format!(
            "embedding must be an array, got {other}"
        ))),
    }
}
