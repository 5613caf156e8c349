use std::collections::BTreeMap;

use index::{IndexError, Language, Payload, RecordId, PRIMARY_FIELD, SECONDARY_FIELD};
use semantic::SemanticError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::threshold::MatchLabel;

/// Retriever settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Used when a caller does not say how many candidates it wants.
    pub default_max_results: usize,
    /// Upper bound on any single request's `max_results`.
    pub max_results_cap: usize,
    /// Language indexed in the primary vector field.
    pub primary_language: Language,
    /// Language whose text accompanies the primary one on writes.
    pub secondary_language: Language,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_max_results: 3,
            max_results_cap: 50,
            primary_language: Language::Chinese,
            secondary_language: Language::English,
        }
    }
}

impl RetrieverConfig {
    pub fn with_default_max_results(mut self, n: usize) -> Self {
        self.default_max_results = n;
        self
    }

    pub fn with_primary_language(mut self, lang: Language) -> Self {
        self.primary_language = lang;
        self
    }

    pub fn with_secondary_language(mut self, lang: Language) -> Self {
        self.secondary_language = lang;
        self
    }

    /// Vector field holding embeddings of text written in `lang`.
    pub fn field_for(&self, lang: Language) -> &'static str {
        if lang == self.primary_language {
            PRIMARY_FIELD
        } else {
            SECONDARY_FIELD
        }
    }

    /// Whether a query in `lang` is compared against vectors of another
    /// language. Only the secondary field takes queries from third languages.
    pub fn is_cross_language(&self, lang: Language) -> bool {
        lang != self.primary_language && lang != self.secondary_language
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.default_max_results == 0 {
            return Err(MatchError::InvalidConfig(
                "default_max_results must be greater than zero".into(),
            ));
        }
        if self.max_results_cap < self.default_max_results {
            return Err(MatchError::InvalidConfig(
                "max_results_cap must be >= default_max_results".into(),
            ));
        }
        if self.primary_language == self.secondary_language {
            return Err(MatchError::InvalidConfig(
                "primary_language and secondary_language must differ".into(),
            ));
        }
        Ok(())
    }
}

/// One translation-memory suggestion. Built per query, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationMemoryCandidate {
    pub id: RecordId,
    pub source: String,
    pub target: String,
    pub score: f32,
    pub label: MatchLabel,
}

/// A thresholded similarity-search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarHit {
    pub id: RecordId,
    /// Text in the queried language.
    pub text: String,
    pub score: f32,
    pub label: MatchLabel,
    /// Every non-empty language side of the record.
    pub payload: Payload,
}

/// A knowledge-base write request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    /// Replace the record with this id instead of minting one.
    #[serde(default)]
    pub id: Option<RecordId>,
    pub texts: BTreeMap<Language, String>,
}

impl MemoryEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, lang: Language, text: impl Into<String>) -> Self {
        self.texts.insert(lang, text.into());
        self
    }

    /// Trimmed text for `lang`, `None` when missing or blank.
    pub fn text(&self, lang: Language) -> Option<&str> {
        self.texts
            .get(&lang)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
    }
}

/// Errors produced by the retrieval layer.
///
/// Service failures never show up here on the read path; the retriever logs
/// them and returns no candidates.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The caller broke a precondition (zero result limit, blank required text).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
    #[error("embedding error: {0}")]
    Semantic(#[from] SemanticError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = RetrieverConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.default_max_results, 3);
        assert_eq!(cfg.primary_language, Language::Chinese);
    }

    #[test]
    fn only_third_languages_are_cross_language() {
        let cfg = RetrieverConfig::default();
        assert!(!cfg.is_cross_language(Language::Chinese));
        assert!(!cfg.is_cross_language(Language::English));
        assert!(cfg.is_cross_language(Language::Japanese));
        assert!(cfg.is_cross_language(Language::French));
    }

    #[test]
    fn zero_default_results_rejected() {
        let cfg = RetrieverConfig::default().with_default_max_results(0);
        match cfg.validate().expect_err("config should be invalid") {
            MatchError::InvalidConfig(msg) => assert!(msg.contains("default_max_results")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn identical_languages_rejected() {
        let cfg = RetrieverConfig::default().with_secondary_language(Language::Chinese);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn field_follows_primary_language() {
        let cfg = RetrieverConfig::default();
        assert_eq!(cfg.field_for(Language::Chinese), PRIMARY_FIELD);
        assert_eq!(cfg.field_for(Language::Japanese), SECONDARY_FIELD);

        let flipped = cfg.with_primary_language(Language::English);
        assert_eq!(flipped.field_for(Language::English), PRIMARY_FIELD);
        assert_eq!(flipped.field_for(Language::Chinese), SECONDARY_FIELD);
    }

    #[test]
    fn memory_entry_deserializes_language_keys() {
        let entry: MemoryEntry = serde_json::from_str(
            r#"{"texts": {"Chinese": "你好", "en": "hello", "Korean": "  "}}"#,
        )
        .unwrap();
        assert_eq!(entry.text(Language::Chinese), Some("你好"));
        assert_eq!(entry.text(Language::English), Some("hello"));
        assert_eq!(entry.text(Language::Korean), None);
        assert!(entry.id.is_none());
    }
}
