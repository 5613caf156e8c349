use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use matcher::{MatchLabel, SimilarityLevel, UseCase};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tmkb::Language;

const LEVELS: [SimilarityLevel; 3] = [
    SimilarityLevel::High,
    SimilarityLevel::Medium,
    SimilarityLevel::Low,
];
const USE_CASES: [UseCase; 3] = [UseCase::Translation, UseCase::Recommendation, UseCase::Search];

/// `GET /api/v1/thresholds`: the active table plus every recommended cutoff,
/// keyed `recommended.{same_language|cross_language}.{level}.{use_case}`.
pub async fn table(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let table = state.stack.thresholds();
    let mut recommended = Map::new();
    for (key, cross) in [("same_language", false), ("cross_language", true)] {
        let mut by_level = Map::new();
        for level in LEVELS {
            let by_use_case: Map<String, Value> = USE_CASES
                .iter()
                .map(|&use_case| {
                    (
                        enum_key(&use_case),
                        json!(table.recommended_threshold(cross, level, use_case)),
                    )
                })
                .collect();
            by_level.insert(enum_key(&level), Value::Object(by_use_case));
        }
        recommended.insert(key.to_string(), Value::Object(by_level));
    }

    Json(json!({
        "table": table,
        "recommended": recommended,
    }))
}

/// Serialized name of a unit enum variant (`"high"`, `"search"`, ...).
fn enum_key<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RecommendedQuery {
    #[serde(default)]
    pub cross_language: bool,
    /// Unknown levels get the baseline cutoff instead of an error.
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub use_case: UseCase,
}

/// `GET /api/v1/thresholds/recommended?cross_language=&level=&use_case=`
pub async fn recommended(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RecommendedQuery>,
) -> impl IntoResponse {
    let level = query.level.as_deref().unwrap_or("medium");
    let threshold = state.stack.thresholds().recommended_threshold_for(
        query.cross_language,
        level,
        query.use_case,
    );
    Json(json!({
        "cross_language": query.cross_language,
        "level": level,
        "use_case": query.use_case,
        "threshold": threshold,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub score: f32,
    #[serde(default)]
    pub cross_language: bool,
    pub language: Language,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub score: f32,
    pub label: MatchLabel,
    pub unrelated_floor: f32,
}

/// `POST /api/v1/thresholds/classify`
pub async fn classify(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ClassifyRequest>,
) -> ServerResult<impl IntoResponse> {
    let table = state.stack.thresholds();
    if !request.score.is_finite() {
        return Err(crate::error::ServerError::BadRequest(
            "score must be a finite number".into(),
        ));
    }
    Ok(Json(ClassifyResponse {
        score: request.score,
        label: table.classify(request.score, request.cross_language, request.language),
        unrelated_floor: table.unrelated_floor(request.language),
    }))
}
