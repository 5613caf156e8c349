//! YAML configuration for the TMKB retrieval stack.
//!
//! One file describes the embedding provider, the vector index, the retriever
//! and (optionally) a custom threshold table. Anything omitted takes its
//! default, and a handful of environment variables override the file so
//! containers can be configured without mounting one.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "production"
//!
//! embedding:
//!   provider: "ollama"
//!   ollama_url: "http://localhost:11434"
//!   model_name: "bge-m3"
//!   timeout_secs: 30
//!   normalize: false
//!
//! index:
//!   backend: "qdrant"
//!   url: "http://localhost:6333"
//!   collection: "translation_memory"
//!   dimension: 1024
//!   retry:
//!     max_retries: 2
//!     base_delay: 1000
//!     backoff_multiplier: 2.0
//!
//! retriever:
//!   default_max_results: 3
//!   primary_language: "Chinese"
//!   secondary_language: "English"
//! ```
//!
//! ## Environment overrides
//!
//! | Variable               | Field                  |
//! |------------------------|------------------------|
//! | `TMKB_OLLAMA_URL`      | `embedding.ollama_url` |
//! | `TMKB_EMBEDDING_MODEL` | `embedding.model_name` |
//! | `TMKB_QDRANT_URL`      | `index.url` (and selects the qdrant backend) |
//! | `TMKB_QDRANT_API_KEY`  | `index.api_key`        |
//! | `TMKB_COLLECTION`      | `index.collection`     |
//! | `TMKB_VECTOR_DIM`      | `index.dimension`      |

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use index::{BackendConfig, CollectionSchema, QdrantConfig, RetryConfig};
use matcher::{RetrieverConfig, ThresholdTable};
use semantic::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_OLLAMA_URL: &str = "TMKB_OLLAMA_URL";
pub const ENV_EMBEDDING_MODEL: &str = "TMKB_EMBEDDING_MODEL";
pub const ENV_QDRANT_URL: &str = "TMKB_QDRANT_URL";
pub const ENV_QDRANT_API_KEY: &str = "TMKB_QDRANT_API_KEY";
pub const ENV_COLLECTION: &str = "TMKB_COLLECTION";
pub const ENV_VECTOR_DIM: &str = "TMKB_VECTOR_DIM";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration for the whole stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmkbConfig {
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub embedding: EmbeddingYamlConfig,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub retriever: RetrieverConfig,

    /// Replaces the built-in threshold table when present.
    #[serde(default)]
    pub thresholds: Option<ThresholdTable>,

    /// Same keys as the environment overrides; applied before the real
    /// environment so the process environment wins.
    #[serde(default)]
    pub env_overrides: HashMap<String, String>,
}

impl Default for TmkbConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            embedding: EmbeddingYamlConfig::default(),
            index: IndexYamlConfig::default(),
            retriever: RetrieverConfig::default(),
            thresholds: None,
            env_overrides: HashMap::new(),
        }
    }
}

impl TmkbConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: TmkbConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given (defaults otherwise), then apply the file's
    /// `env_overrides` and the process environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut config = match path {
            Some(p) => {
                let content = fs::read_to_string(p)?;
                serde_yaml::from_str(&content)?
            }
            None => TmkbConfig::default(),
        };
        let file_overrides = config.env_overrides.clone();
        config.apply_overrides(|key| file_overrides.get(key).cloned())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, keyed by the `TMKB_*` variable names.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_OLLAMA_URL) {
            self.embedding.ollama_url = url;
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            self.embedding.model_name = model;
        }
        if let Some(url) = get(ENV_QDRANT_URL) {
            self.index.url = url;
            self.index.backend = IndexBackendKind::Qdrant;
        }
        if let Some(key) = get(ENV_QDRANT_API_KEY) {
            self.index.api_key = Some(key);
        }
        if let Some(collection) = get(ENV_COLLECTION) {
            self.index.collection = collection;
        }
        if let Some(dim) = get(ENV_VECTOR_DIM) {
            self.index.dimension = dim.trim().parse().map_err(|_| {
                ConfigLoadError::Validation(format!("{ENV_VECTOR_DIM} must be a positive integer, got `{dim}`"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.embedding.validate()?;
        self.index.validate()?;
        self.retriever
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        if let Some(table) = &self.thresholds {
            table
                .validate()
                .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        }
        Ok(())
    }

    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig::default()
            .with_ollama_url(&self.embedding.ollama_url)
            .with_model_name(&self.embedding.model_name)
            .with_timeout_secs(self.embedding.timeout_secs)
            .with_normalize(self.embedding.normalize)
    }

    pub fn backend_config(&self) -> BackendConfig {
        match self.index.backend {
            IndexBackendKind::InMemory => BackendConfig::InMemory,
            IndexBackendKind::Qdrant => BackendConfig::Qdrant(QdrantConfig {
                url: self.index.url.clone(),
                api_key: self.index.api_key.clone(),
                timeout_secs: self.index.timeout_secs,
                retry: self.index.retry,
            }),
        }
    }

    pub fn collection_schema(&self) -> CollectionSchema {
        CollectionSchema::translation_memory(&self.index.collection, self.index.dimension)
    }

    pub fn threshold_table(&self) -> ThresholdTable {
        self.thresholds
            .clone()
            .unwrap_or_else(|| ThresholdTable::global().clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    #[default]
    Ollama,
    /// Deterministic offline vectors; no service needed.
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingYamlConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub normalize: bool,
}

impl EmbeddingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.provider == EmbeddingProvider::Ollama {
            if self.ollama_url.trim().is_empty() {
                return Err(ConfigLoadError::Validation(
                    "embedding.ollama_url must not be empty".into(),
                ));
            }
            if self.model_name.trim().is_empty() {
                return Err(ConfigLoadError::Validation(
                    "embedding.model_name must not be empty".into(),
                ));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "embedding.timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EmbeddingYamlConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            ollama_url: default_ollama_url(),
            model_name: default_model_name(),
            timeout_secs: default_embedding_timeout(),
            normalize: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackendKind {
    #[default]
    InMemory,
    Qdrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexYamlConfig {
    #[serde(default)]
    pub backend: IndexBackendKind,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "index.collection must not be empty".into(),
            ));
        }
        if self.dimension == 0 {
            return Err(ConfigLoadError::Validation(
                "index.dimension must be >= 1".into(),
            ));
        }
        if self.backend == IndexBackendKind::Qdrant && self.url.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "index.url is required for the qdrant backend".into(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigLoadError::Validation(
                "index.retry.backoff_multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackendKind::default(),
            url: default_qdrant_url(),
            api_key: None,
            collection: default_collection(),
            dimension: default_dimension(),
            timeout_secs: default_index_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model_name() -> String {
    "bge-m3".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "translation_memory".to_string()
}
fn default_dimension() -> usize {
    1024
}
fn default_index_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::Language;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
embedding:
  model_name: "nomic-embed-text"
index:
  backend: "qdrant"
  url: "http://qdrant:6333"
  dimension: 768
"#;

        let config = TmkbConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("test config"));
        assert_eq!(config.embedding.model_name, "nomic-embed-text");
        assert_eq!(config.embedding.ollama_url, "http://localhost:11434");
        assert_eq!(config.index.dimension, 768);
        assert_eq!(config.index.collection, "translation_memory");
        assert!(matches!(config.backend_config(), BackendConfig::Qdrant(_)));
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1.0"
retriever:
  default_max_results: 5
  primary_language: "zh"
  secondary_language: "English"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = TmkbConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.retriever.default_max_results, 5);
        assert_eq!(config.retriever.primary_language, Language::Chinese);
    }

    #[test]
    fn test_default_config() {
        let config = TmkbConfig::default();
        assert!(config.validate().is_ok());
        assert!(matches!(config.backend_config(), BackendConfig::InMemory));
        let schema = config.collection_schema();
        assert_eq!(schema.name, "translation_memory");
        assert_eq!(schema.fields.len(), 2);
    }

    #[test]
    fn test_unsupported_version() {
        let err = TmkbConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(_)));
    }

    #[test]
    fn test_index_validation() {
        let yaml = r#"
version: "1.0"
index:
  dimension: 0
"#;
        let err = TmkbConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }

    #[test]
    fn test_threshold_validation() {
        let yaml = r#"
version: "1.0"
thresholds:
  same_language: { high: 0.5, medium: 0.8, low: 0.7 }
"#;
        let err = TmkbConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("same_language"));
    }

    #[test]
    fn test_retry_parses_millis() {
        let yaml = r#"
version: "1.0"
index:
  retry:
    max_retries: 4
    base_delay: 250
"#;
        let config = TmkbConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.index.retry.max_retries, 4);
        assert_eq!(config.index.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.index.retry.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_OLLAMA_URL, "http://ollama:11434"),
            (ENV_EMBEDDING_MODEL, "bge-large"),
            (ENV_QDRANT_URL, "http://qdrant:6333"),
            (ENV_QDRANT_API_KEY, "secret"),
            (ENV_COLLECTION, "tm_v2"),
            (ENV_VECTOR_DIM, "768"),
        ]);
        let mut config = TmkbConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.embedding.ollama_url, "http://ollama:11434");
        assert_eq!(config.embedding.model_name, "bge-large");
        assert_eq!(config.index.backend, IndexBackendKind::Qdrant);
        assert_eq!(config.index.api_key.as_deref(), Some("secret"));
        assert_eq!(config.collection_schema().name, "tm_v2");
        assert_eq!(config.index.dimension, 768);
    }

    #[test]
    fn test_bad_dimension_override() {
        let mut config = TmkbConfig::default();
        let err = config
            .apply_overrides(|k| (k == ENV_VECTOR_DIM).then(|| "large".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_VECTOR_DIM));
    }

    #[test]
    fn test_file_env_overrides_applied_by_load() {
        let yaml = r#"
version: "1.0"
env_overrides:
  TMKB_COLLECTION: "from_file"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = TmkbConfig::load(Some(temp_file.path())).unwrap();
        // The process environment may legitimately override this in CI.
        if std::env::var(ENV_COLLECTION).is_err() {
            assert_eq!(config.index.collection, "from_file");
        }
    }

    #[test]
    fn test_conversions() {
        let mut config = TmkbConfig::default();
        config.embedding.normalize = true;
        let emb = config.embedding_config();
        assert!(emb.normalize);
        assert_eq!(emb.model_name, "bge-m3");
        assert_eq!(config.threshold_table(), *ThresholdTable::global());
    }
}
