use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use index::{Language, RawHit, VectorAvailability, VectorStore};
use semantic::Embedder;

use crate::threshold::{SimilarityLevel, ThresholdTable, UseCase};
use crate::types::{MatchError, RetrieverConfig, SimilarHit, TranslationMemoryCandidate};

#[cfg(test)]
mod tests;

/// Looks up translation memory for a source text.
///
/// Every dependency is shared behind an `Arc`, so one retriever serves any
/// number of concurrent requests. Service trouble never escapes: a failed
/// embedding or search is logged and the caller sees no candidates.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    availability: Arc<VectorAvailability>,
    thresholds: Arc<ThresholdTable>,
    cfg: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        availability: Arc<VectorAvailability>,
    ) -> Self {
        Self {
            embedder,
            store,
            availability,
            thresholds: Arc::new(ThresholdTable::global().clone()),
            cfg: RetrieverConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: RetrieverConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Arc<ThresholdTable>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.cfg
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn availability(&self) -> &Arc<VectorAvailability> {
        &self.availability
    }

    fn check_limit(&self, max_results: usize) -> Result<usize, MatchError> {
        if max_results == 0 {
            return Err(MatchError::InvalidRequest(
                "max_results must be greater than zero".into(),
            ));
        }
        Ok(max_results.min(self.cfg.max_results_cap))
    }

    /// Embed `text` and search `field`. `None` means the lookup was skipped or
    /// failed; the reason has already been logged.
    async fn nearest(&self, text: &str, field: &str, limit: usize) -> Option<Vec<RawHit>> {
        if !self.availability.is_available() {
            tracing::debug!(field, "vector service unavailable, skipping lookup");
            return None;
        }

        let vector = match self.embedder.generate_embedding(text).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    model = self.embedder.model_name(),
                    "embedding failed, continuing without translation memory"
                );
                return None;
            }
        };

        Some(self.store.search(field, &vector, limit, true).await)
    }

    /// Up to `max_results` stored pairs whose source side resembles `text`,
    /// best first. Hits missing either side are dropped.
    pub async fn get_translation_memory(
        &self,
        text: &str,
        source_language: Language,
        target_language: Language,
        max_results: usize,
    ) -> Result<Vec<TranslationMemoryCandidate>, MatchError> {
        let limit = self.check_limit(max_results)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let field = self.cfg.field_for(source_language);
        let cross_language = self.cfg.is_cross_language(source_language);
        let Some(hits) = self.nearest(text, field, limit).await else {
            return Ok(Vec::new());
        };
        let total = hits.len();

        let candidates: Vec<TranslationMemoryCandidate> = hits
            .into_iter()
            .filter_map(|hit| {
                let source = hit.text(source_language)?.trim().to_string();
                let target = hit.text(target_language)?.trim().to_string();
                Some(TranslationMemoryCandidate {
                    label: self
                        .thresholds
                        .classify(hit.score, cross_language, source_language),
                    id: hit.id,
                    source,
                    target,
                    score: hit.score,
                })
            })
            .collect();

        tracing::debug!(
            field,
            cross_language,
            source = %source_language,
            target = %target_language,
            hits = total,
            kept = candidates.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "translation memory lookup"
        );
        Ok(candidates)
    }

    /// [`get_translation_memory`](Self::get_translation_memory) for many texts
    /// at once. Lookups run concurrently; results keep input order.
    pub async fn get_translation_memory_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        source_language: Language,
        target_language: Language,
        max_results: usize,
    ) -> Result<Vec<Vec<TranslationMemoryCandidate>>, MatchError> {
        self.check_limit(max_results)?;
        let lookups = texts.iter().map(|t| {
            self.get_translation_memory(t.as_ref(), source_language, target_language, max_results)
        });
        join_all(lookups).await.into_iter().collect()
    }

    /// Records whose `language` side scores at or above the recommended
    /// cutoff for `level` and `use_case`.
    pub async fn find_similar(
        &self,
        text: &str,
        language: Language,
        level: SimilarityLevel,
        use_case: UseCase,
        limit: usize,
    ) -> Result<Vec<SimilarHit>, MatchError> {
        let limit = self.check_limit(limit)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let cross_language = self.cfg.is_cross_language(language);
        let cutoff = self
            .thresholds
            .recommended_threshold(cross_language, level, use_case);
        let field = self.cfg.field_for(language);
        let Some(hits) = self.nearest(text, field, limit).await else {
            return Ok(Vec::new());
        };

        let similar: Vec<SimilarHit> = hits
            .into_iter()
            .filter(|hit| hit.score >= cutoff)
            .filter_map(|hit| {
                let text = hit.text(language)?.to_string();
                let payload = hit
                    .payload
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|(_, v)| !v.trim().is_empty())
                    .collect();
                Some(SimilarHit {
                    label: self.thresholds.classify(hit.score, cross_language, language),
                    id: hit.id,
                    text,
                    score: hit.score,
                    payload,
                })
            })
            .collect();

        tracing::debug!(field, cross_language, cutoff, kept = similar.len(), "similarity search");
        Ok(similar)
    }
}
