use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use matcher::{MemoryEntry, SimilarHit, SimilarityLevel, TranslationMemoryCandidate, UseCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tmkb::{format_memory_context, Language, RecordId};

/// Upper bound on texts in one batch lookup.
const MAX_BATCH_TEXTS: usize = 256;

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub text: String,
    pub source_language: Language,
    pub target_language: Language,
    /// Falls back to the retriever's configured default.
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Also return the candidates rendered as a prompt block.
    #[serde(default)]
    pub include_context: bool,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub total: usize,
    pub candidates: Vec<TranslationMemoryCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// `POST /api/v1/memory/lookup`
pub async fn lookup(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LookupRequest>,
) -> ServerResult<impl IntoResponse> {
    let candidates = state
        .stack
        .lookup(
            &request.text,
            request.source_language,
            request.target_language,
            request.max_results,
        )
        .await?;

    let context = request.include_context.then(|| {
        format_memory_context(&candidates, request.source_language, request.target_language)
    });

    Ok(Json(LookupResponse {
        total: candidates.len(),
        candidates,
        context,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BatchLookupRequest {
    pub texts: Vec<String>,
    pub source_language: Language,
    pub target_language: Language,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BatchLookupResponse {
    /// One entry per input text, in input order.
    pub results: Vec<Vec<TranslationMemoryCandidate>>,
}

/// `POST /api/v1/memory/lookup/batch`
pub async fn lookup_batch(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BatchLookupRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.texts.len() > MAX_BATCH_TEXTS {
        return Err(ServerError::BadRequest(format!(
            "at most {MAX_BATCH_TEXTS} texts per batch, got {}",
            request.texts.len()
        )));
    }

    let retriever = state.stack.retriever();
    let limit = request
        .max_results
        .unwrap_or(retriever.config().default_max_results);
    let results = retriever
        .get_translation_memory_batch(
            request.texts.as_slice(),
            request.source_language,
            request.target_language,
            limit,
        )
        .await?;

    Ok(Json(BatchLookupResponse { results }))
}

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    /// Unsigned integer or UUID; replaces the record with this id when given.
    #[serde(default)]
    pub id: Option<RecordId>,
    /// Text per language, keyed by name or ISO code.
    pub texts: BTreeMap<Language, String>,
}

#[derive(Debug, Serialize)]
pub struct RememberResponse {
    pub stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
}

/// `POST /api/v1/memory/entries`
///
/// 201 when stored, 202 when the vector service is down and the entry was
/// dropped.
pub async fn remember(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RememberRequest>,
) -> ServerResult<impl IntoResponse> {
    let mut entry = MemoryEntry::new();
    for (lang, text) in request.texts {
        entry = entry.with_text(lang, text);
    }
    if let Some(id) = request.id {
        entry = entry.with_id(id);
    }

    let id = state.stack.remember(entry).await?;
    let status = if id.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };
    Ok((
        status,
        Json(RememberResponse {
            stored: id.is_some(),
            id,
        }),
    ))
}

/// `DELETE /api/v1/memory/entries/{id}`
pub async fn forget(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    if id.trim().is_empty() {
        return Err(ServerError::BadRequest("id must not be empty".into()));
    }
    let deleted = state.stack.forget(&id).await;
    Ok(Json(serde_json::json!({ "id": id, "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    pub language: Language,
    #[serde(default = "default_level")]
    pub level: SimilarityLevel,
    #[serde(default)]
    pub use_case: UseCase,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_level() -> SimilarityLevel {
    SimilarityLevel::Medium
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub threshold: f32,
    pub hits: Vec<SimilarHit>,
}

/// `POST /api/v1/memory/search`: same-language similarity search above
/// the recommended cutoff.
pub async fn search(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<SearchRequest>,
) -> ServerResult<impl IntoResponse> {
    let retriever = state.stack.retriever();
    let limit = request
        .limit
        .unwrap_or(retriever.config().default_max_results);
    let threshold = retriever
        .thresholds()
        .recommended_threshold(false, request.level, request.use_case);
    let hits = retriever
        .find_similar(
            &request.text,
            request.language,
            request.level,
            request.use_case,
            limit,
        )
        .await?;

    Ok(Json(SearchResponse { threshold, hits }))
}
