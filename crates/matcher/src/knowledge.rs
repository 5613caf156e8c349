use std::sync::Arc;

use index::{
    IndexError, Language, PointId, RecordId, VectorAvailability, VectorRecord, VectorStore,
    PRIMARY_FIELD, SECONDARY_FIELD,
};
use semantic::Embedder;

use crate::types::{MatchError, MemoryEntry};

/// Write side of the translation memory.
///
/// The primary-language text is mandatory and always embedded. The secondary
/// text is embedded when present; if that embedding fails the record is
/// stored without the secondary vector.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    availability: Arc<VectorAvailability>,
    primary: Language,
    secondary: Language,
}

impl KnowledgeBase {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        availability: Arc<VectorAvailability>,
    ) -> Self {
        Self {
            embedder,
            store,
            availability,
            primary: Language::Chinese,
            secondary: Language::English,
        }
    }

    pub fn with_languages(mut self, primary: Language, secondary: Language) -> Self {
        self.primary = primary;
        self.secondary = secondary;
        self
    }

    /// Store `entry`. Returns `Ok(None)` without writing while the vector
    /// service is unavailable.
    pub async fn remember(&self, entry: MemoryEntry) -> Result<Option<RecordId>, MatchError> {
        let Some(primary_text) = entry.text(self.primary) else {
            return Err(IndexError::InvalidRecord(format!(
                "`{}` text must not be empty",
                self.primary
            ))
            .into());
        };
        if let Some(id) = &entry.id {
            PointId::parse(id)?;
        }

        if !self.availability.is_available() {
            tracing::warn!("vector service unavailable, entry not stored");
            return Ok(None);
        }

        let primary_vector = self.embedder.generate_embedding(primary_text).await?;
        let mut record = VectorRecord::new(self.primary).with_vector(PRIMARY_FIELD, primary_vector);

        if let Some(secondary_text) = entry.text(self.secondary) {
            match self.embedder.generate_embedding(secondary_text).await {
                Ok(v) => record = record.with_vector(SECONDARY_FIELD, v),
                Err(e) => tracing::warn!(
                    error = %e,
                    language = %self.secondary,
                    "secondary embedding failed, storing partial record"
                ),
            }
        }

        for (lang, text) in &entry.texts {
            record = record.with_text(*lang, text.trim());
        }
        if let Some(id) = entry.id {
            record = record.with_id(id);
        }

        let id = self.store.upsert(record).await?;
        tracing::info!(id = %id, "translation memory entry stored");
        Ok(Some(id))
    }

    /// Delete a stored entry. `false` when unavailable or the delete failed.
    pub async fn forget(&self, id: &str) -> bool {
        if !self.availability.is_available() {
            tracing::warn!(id, "vector service unavailable, entry not deleted");
            return false;
        }
        self.store.delete(id).await
    }
}
