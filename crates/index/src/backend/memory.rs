use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use semantic::{cosine_similarity, Embedding};

use crate::{
    CollectionSchema, IndexError, Payload, PointId, RawHit, RecordId, SchemaCheck,
    VectorAvailability, VectorFieldSpec, VectorRecord, VectorStore,
};

struct Collection {
    schema: CollectionSchema,
    records: HashMap<RecordId, Stored>,
}

struct Stored {
    vectors: BTreeMap<String, Embedding>,
    payload: Payload,
}

/// Brute-force cosine store behind a `RwLock`.
///
/// Follows the same collection lifecycle as the remote backend, including
/// destructive recreation on drift, and can be switched offline to exercise
/// outage handling.
pub struct InMemoryStore {
    default_schema: RwLock<CollectionSchema>,
    collection: RwLock<Option<Collection>>,
    online: AtomicBool,
    recreations: AtomicUsize,
    availability: Option<Arc<VectorAvailability>>,
}

impl InMemoryStore {
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            default_schema: RwLock::new(schema),
            collection: RwLock::new(None),
            online: AtomicBool::new(true),
            recreations: AtomicUsize::new(0),
            availability: None,
        }
    }

    pub fn with_availability(mut self, availability: Arc<VectorAvailability>) -> Self {
        self.availability = Some(availability);
        self
    }

    /// Simulate the service going away (`false`) or coming back.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Times a drifted collection was dropped and recreated.
    pub fn recreations(&self) -> usize {
        self.recreations.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.collection
            .read()
            .map(|c| c.as_ref().map_or(0, |c| c.records.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed the collection with an arbitrary layout, bypassing reconciliation.
    /// Lets tests start from a drifted collection.
    pub fn install_collection(&self, schema: CollectionSchema) -> Result<(), IndexError> {
        let mut guard = self
            .collection
            .write()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        *guard = Some(Collection {
            schema,
            records: HashMap::new(),
        });
        Ok(())
    }

    fn check_online(&self) -> Result<(), IndexError> {
        if self.online.load(Ordering::Acquire) {
            Ok(())
        } else {
            let err = IndexError::ConnectionRefused("in-memory store is offline".into());
            if let Some(a) = &self.availability {
                a.mark_unavailable(&err);
            }
            Err(err)
        }
    }

    fn reconcile(&self, schema: &CollectionSchema) -> Result<(), IndexError> {
        self.check_online()?;
        schema.validate()?;

        let mut guard = self
            .collection
            .write()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        match guard.as_ref().map(|c| schema.check(&c.schema.fields)) {
            None => {
                tracing::info!(collection = %schema.name, "creating collection");
            }
            Some(SchemaCheck::Matches) => return Ok(()),
            Some(SchemaCheck::Drift(reasons)) => {
                tracing::warn!(
                    collection = %schema.name,
                    reasons = ?reasons,
                    "schema drift, recreating collection; existing records are dropped"
                );
                self.recreations.fetch_add(1, Ordering::AcqRel);
            }
        }
        *guard = Some(Collection {
            schema: schema.clone(),
            records: HashMap::new(),
        });
        Ok(())
    }

    fn schema_snapshot(&self) -> Result<CollectionSchema, IndexError> {
        self.default_schema
            .read()
            .map(|s| s.clone())
            .map_err(|_| IndexError::backend("poisoned lock"))
    }

    fn try_upsert(&self, record: VectorRecord) -> Result<RecordId, IndexError> {
        self.check_online()?;
        record.validate()?;

        if self.collection.read().map_err(|_| IndexError::backend("poisoned lock"))?.is_none() {
            let schema = self.schema_snapshot()?;
            self.reconcile(&schema)?;
        }

        let mut guard = self
            .collection
            .write()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        let collection = guard
            .as_mut()
            .ok_or_else(|| IndexError::CollectionNotFound("in-memory".into()))?;

        for (field, vector) in record.vectors.iter().filter(|(_, v)| !v.is_empty()) {
            check_field(&collection.schema.fields, field, vector.len())?;
        }

        let id = record.point_id()?.to_string();
        let vectors = record
            .vectors
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        collection.records.insert(
            id.clone(),
            Stored {
                vectors,
                payload: record.payload,
            },
        );
        Ok(id)
    }
}

fn check_field(
    fields: &BTreeMap<String, VectorFieldSpec>,
    field: &str,
    len: usize,
) -> Result<(), IndexError> {
    match fields.get(field) {
        None => Err(IndexError::InvalidRecord(format!(
            "unknown vector field `{field}`"
        ))),
        Some(spec) if spec.size != len => Err(IndexError::InvalidRecord(format!(
            "vector field `{field}` expects dimension {}, got {len}",
            spec.size
        ))),
        Some(_) => Ok(()),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> bool {
        if let Ok(mut current) = self.default_schema.write() {
            *current = schema.clone();
        }
        match self.reconcile(schema) {
            Ok(()) => {
                if let Some(a) = &self.availability {
                    a.mark_available();
                }
                true
            }
            Err(e) => {
                tracing::error!(error = %e, collection = %schema.name, "collection reconcile failed");
                if let Some(a) = &self.availability {
                    a.mark_unavailable(&e);
                }
                false
            }
        }
    }

    async fn upsert(&self, record: VectorRecord) -> Result<RecordId, IndexError> {
        self.try_upsert(record)
    }

    async fn search(
        &self,
        field: &str,
        query: &[f32],
        limit: usize,
        with_payload: bool,
    ) -> Vec<RawHit> {
        if limit == 0 || query.is_empty() || self.check_online().is_err() {
            return Vec::new();
        }
        let Ok(guard) = self.collection.read() else {
            return Vec::new();
        };
        let Some(collection) = guard.as_ref() else {
            return Vec::new();
        };

        let mut hits: Vec<RawHit> = collection
            .records
            .iter()
            .filter_map(|(id, stored)| {
                let vector = stored.vectors.get(field)?;
                Some(RawHit {
                    id: id.clone(),
                    score: cosine_similarity(query, vector),
                    payload: with_payload.then(|| stored.payload.clone()),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        hits
    }

    async fn delete(&self, id: &str) -> bool {
        if self.check_online().is_err() {
            return false;
        }
        // Malformed ids can never have been stored.
        let Ok(key) = PointId::parse(id) else {
            return true;
        };
        match self.collection.write() {
            Ok(mut guard) => {
                if let Some(collection) = guard.as_mut() {
                    collection.records.remove(&key.to_string());
                }
                true
            }
            Err(_) => false,
        }
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}
