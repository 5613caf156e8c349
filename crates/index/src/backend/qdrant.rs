use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::retry::{with_retry, RetryConfig};
use crate::{
    CollectionSchema, Distance, IndexError, Payload, PointId, RawHit, RecordId, SchemaCheck,
    VectorAvailability, VectorFieldSpec, VectorRecord, VectorStore,
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    /// Sent as the `api-key` header when set.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Backoff for collection reconciliation.
    pub retry: RetryConfig,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".into(),
            api_key: None,
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl QdrantConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// [`VectorStore`] over the Qdrant REST API.
///
/// The collection layout comes from the [`CollectionSchema`] passed at
/// construction, replaced by whatever the latest
/// [`ensure_collection`](VectorStore::ensure_collection) call saw. Upserts and
/// searches that hit a missing collection create it once and try again.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    schema: RwLock<CollectionSchema>,
    availability: Option<Arc<VectorAvailability>>,
}

impl QdrantStore {
    pub fn new(cfg: QdrantConfig, schema: CollectionSchema) -> Result<Self, IndexError> {
        if cfg.url.trim().is_empty() {
            return Err(IndexError::backend("qdrant url is required"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(IndexError::backend)?;

        Ok(Self {
            client,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.filter(|k| !k.is_empty()),
            retry: cfg.retry,
            schema: RwLock::new(schema),
            availability: None,
        })
    }

    pub fn with_availability(mut self, availability: Arc<VectorAvailability>) -> Self {
        self.availability = Some(availability);
        self
    }

    fn schema_snapshot(&self) -> CollectionSchema {
        self.schema
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn collection_name(&self) -> String {
        self.schema
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .name
            .clone()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Send and unwrap the `result` member of a Qdrant response envelope.
    async fn call(&self, builder: RequestBuilder, collection: &str) -> Result<Value, IndexError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(IndexError::CollectionNotFound(collection.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Ok(body.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }

    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        let result = self.call(self.request(Method::GET, "/collections"), "").await?;
        let names = result
            .get("collections")
            .and_then(Value::as_array)
            .ok_or_else(|| IndexError::Decode("missing `collections` array".into()))?
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    async fn live_fields(&self, name: &str) -> Result<BTreeMap<String, VectorFieldSpec>, IndexError> {
        let result = self
            .call(self.request(Method::GET, &format!("/collections/{name}")), name)
            .await?;
        let vectors = result
            .pointer("/config/params/vectors")
            .ok_or_else(|| IndexError::Decode("missing `config.params.vectors`".into()))?;
        parse_vector_params(vectors)
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<(), IndexError> {
        let vectors: Map<String, Value> = schema
            .fields
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    json!({ "size": spec.size, "distance": spec.distance.as_str() }),
                )
            })
            .collect();
        let builder = self
            .request(Method::PUT, &format!("/collections/{}", schema.name))
            .json(&json!({ "vectors": vectors }));

        match self.call(builder, &schema.name).await {
            Ok(_) => Ok(()),
            // Someone else created it between our list and create.
            Err(IndexError::Status { status: 409, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn drop_collection(&self, name: &str) -> Result<(), IndexError> {
        let builder = self.request(Method::DELETE, &format!("/collections/{name}"));
        match self.call(builder, name).await {
            Ok(_) | Err(IndexError::CollectionNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// One reconcile pass without retries.
    async fn reconcile(&self, schema: &CollectionSchema) -> Result<(), IndexError> {
        let existing = self.list_collections().await?;
        if !existing.iter().any(|n| n == &schema.name) {
            tracing::info!(collection = %schema.name, "creating collection");
            return self.create_collection(schema).await;
        }

        let live = self.live_fields(&schema.name).await?;
        match schema.check(&live) {
            SchemaCheck::Matches => {
                tracing::debug!(collection = %schema.name, "collection schema up to date");
                Ok(())
            }
            SchemaCheck::Drift(reasons) => {
                tracing::warn!(
                    collection = %schema.name,
                    reasons = ?reasons,
                    "schema drift, recreating collection; existing records are dropped"
                );
                self.drop_collection(&schema.name).await?;
                self.create_collection(schema).await
            }
        }
    }

    async fn lazy_create(&self) -> Result<(), IndexError> {
        let schema = self.schema_snapshot();
        tracing::warn!(collection = %schema.name, "collection missing, creating it");
        self.reconcile(&schema).await?;
        self.note_success();
        Ok(())
    }

    async fn put_points(&self, body: &Value) -> Result<(), IndexError> {
        let name = self.collection_name();
        let builder = self
            .request(Method::PUT, &format!("/collections/{name}/points?wait=true"))
            .json(body);
        self.call(builder, &name).await.map(|_| ())
    }

    async fn search_once(&self, body: &Value) -> Result<Vec<RawHit>, IndexError> {
        let name = self.collection_name();
        let builder = self
            .request(Method::POST, &format!("/collections/{name}/points/search"))
            .json(body);
        parse_hits(self.call(builder, &name).await?)
    }

    fn note_success(&self) {
        if let Some(a) = &self.availability {
            a.mark_available();
        }
    }

    fn note_failure(&self, operation: &'static str, err: &IndexError) {
        match err {
            IndexError::ConnectionRefused(_) => tracing::error!(
                operation,
                url = %self.base_url,
                error = %err,
                "vector service refused the connection; is it running?"
            ),
            IndexError::Request(_) => tracing::error!(
                operation,
                url = %self.base_url,
                error = %err,
                "request to vector service failed"
            ),
            IndexError::CollectionNotFound(name) => {
                tracing::warn!(operation, collection = %name, "collection not found")
            }
            _ => tracing::error!(operation, error = %err, "vector service call failed"),
        }
        if err.is_unavailable() {
            if let Some(a) = &self.availability {
                a.mark_unavailable(err);
            }
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> bool {
        if let Err(e) = schema.validate() {
            tracing::error!(error = %e, "refusing to reconcile invalid schema");
            return false;
        }
        *self.schema.write().unwrap_or_else(|p| p.into_inner()) = schema.clone();

        let outcome = with_retry(&self.retry, |_| self.reconcile(schema)).await;
        match outcome.result {
            Ok(()) => {
                tracing::info!(
                    collection = %schema.name,
                    attempts = outcome.attempts,
                    "collection ready"
                );
                self.note_success();
                true
            }
            Err(e) => {
                self.note_failure("ensure_collection", &e);
                if let Some(a) = &self.availability {
                    a.mark_unavailable(&e);
                }
                false
            }
        }
    }

    async fn upsert(&self, record: VectorRecord) -> Result<RecordId, IndexError> {
        record.validate()?;
        let point_id = record.point_id()?;
        let id = point_id.to_string();
        let vectors: Map<String, Value> = record
            .vectors
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(field, v)| (field.clone(), json!(v)))
            .collect();
        let body = json!({
            "points": [{ "id": point_id.to_json(), "vector": vectors, "payload": record.payload }]
        });

        let result = match self.put_points(&body).await {
            Err(IndexError::CollectionNotFound(_)) => match self.lazy_create().await {
                Ok(()) => self.put_points(&body).await,
                Err(e) => Err(e),
            },
            other => other,
        };
        if let Err(e) = result {
            self.note_failure("upsert", &e);
            return Err(e);
        }

        tracing::debug!(id = %id, fields = vectors.len(), "upserted record");
        Ok(id)
    }

    async fn search(
        &self,
        field: &str,
        query: &[f32],
        limit: usize,
        with_payload: bool,
    ) -> Vec<RawHit> {
        if limit == 0 || query.is_empty() {
            return Vec::new();
        }
        let body = json!({
            "vector": { "name": field, "vector": query },
            "limit": limit,
            "with_payload": with_payload,
        });

        let result = match self.search_once(&body).await {
            Err(IndexError::CollectionNotFound(_)) => match self.lazy_create().await {
                Ok(()) => self.search_once(&body).await,
                Err(e) => Err(e),
            },
            other => other,
        };
        match result {
            Ok(hits) => hits,
            Err(e) => {
                self.note_failure("search", &e);
                Vec::new()
            }
        }
    }

    async fn delete(&self, id: &str) -> bool {
        let Ok(point_id) = PointId::parse(id) else {
            tracing::debug!(id, "malformed record id, nothing to delete");
            return true;
        };
        let name = self.collection_name();
        let builder = self
            .request(Method::POST, &format!("/collections/{name}/points/delete?wait=true"))
            .json(&json!({ "points": [point_id.to_json()] }));

        match self.call(builder, &name).await {
            Ok(_) => true,
            Err(IndexError::CollectionNotFound(_)) => {
                tracing::debug!(id, collection = %name, "collection absent, nothing to delete");
                true
            }
            Err(e) => {
                self.note_failure("delete", &e);
                false
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}

/// Accepts both the single unnamed form `{size, distance}` (reported under
/// `""`) and the named map `{field: {size, distance}}`.
fn parse_vector_params(value: &Value) -> Result<BTreeMap<String, VectorFieldSpec>, IndexError> {
    let obj = value
        .as_object()
        .ok_or_else(|| IndexError::Decode("vector params must be an object".into()))?;

    if obj.contains_key("size") {
        return Ok(BTreeMap::from([(String::new(), parse_field_spec(value)?)]));
    }
    obj.iter()
        .map(|(name, spec)| Ok((name.clone(), parse_field_spec(spec)?)))
        .collect()
}

fn parse_field_spec(value: &Value) -> Result<VectorFieldSpec, IndexError> {
    let size = value
        .get("size")
        .and_then(Value::as_u64)
        .ok_or_else(|| IndexError::Decode("vector params missing `size`".into()))?;
    let distance = value
        .get("distance")
        .cloned()
        .and_then(|d| serde_json::from_value::<Distance>(d).ok())
        .unwrap_or_default();
    Ok(VectorFieldSpec {
        size: size as usize,
        distance,
    })
}

fn parse_hits(result: Value) -> Result<Vec<RawHit>, IndexError> {
    let Value::Array(points) = result else {
        return Err(IndexError::Decode("search result must be an array".into()));
    };

    points
        .into_iter()
        .map(|point| {
            let id = match point.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return Err(IndexError::Decode("hit is missing `id`".into())),
            };
            let score = point
                .get("score")
                .and_then(Value::as_f64)
                .ok_or_else(|| IndexError::Decode("hit is missing `score`".into()))?
                as f32;
            let payload = point.get("payload").and_then(Value::as_object).map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect::<Payload>()
            });
            Ok(RawHit { id, score, payload })
        })
        .collect()
}
