use thiserror::Error;

/// Errors surfaced by an [`Embedder`](crate::Embedder).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemanticError {
    /// The caller passed text that is empty after trimming.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The remote embedding call failed or returned malformed data.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),
    /// Configuration is inconsistent (missing URL, unbuildable HTTP client).
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),
}

impl SemanticError {
    /// True for failures caused by the remote service rather than the caller.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, SemanticError::EmbeddingService(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_invalid_input() {
        let err = SemanticError::InvalidInput("text must not be empty".into());
        assert!(err.to_string().contains("invalid input"));
        assert!(err.to_string().contains("text must not be empty"));
        assert!(!err.is_service_failure());
    }

    #[test]
    fn error_embedding_service() {
        let err = SemanticError::EmbeddingService("HTTP error 503".into());
        assert!(err.to_string().contains("embedding service error"));
        assert!(err.to_string().contains("503"));
        assert!(err.is_service_failure());
    }

    #[test]
    fn error_invalid_config() {
        let err = SemanticError::InvalidConfig("ollama_url is empty".into());
        assert!(err.to_string().contains("invalid embedding config"));
    }

    #[test]
    fn error_debug_formatting() {
        let err = SemanticError::InvalidInput("blank".into());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("InvalidInput"));
        assert!(debug_str.contains("blank"));
    }
}
