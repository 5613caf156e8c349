use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use server::{build_router, ServerConfig, ServerState};
use std::sync::Arc;
use tmkb::{EmbeddingProvider, MemoryStack, TmkbConfig};
use tower::ServiceExt;

const KEY: &str = "test-key";

fn stack(dim: usize) -> MemoryStack {
    let mut cfg = TmkbConfig::default();
    cfg.embedding.provider = EmbeddingProvider::Stub;
    cfg.index.dimension = dim;
    MemoryStack::build(&cfg).unwrap()
}

fn server_config() -> ServerConfig {
    ServerConfig {
        api_keys: [KEY.to_string()].into_iter().collect(),
        rate_limit_per_minute: 1000,
        ..ServerConfig::default()
    }
}

async fn app_with(config: ServerConfig, initialize: bool) -> (Router, MemoryStack) {
    let stack = stack(32);
    if initialize {
        assert!(stack.initialize().await);
    }
    let state = Arc::new(ServerState::new(config, stack.clone()));
    (build_router(state), stack)
}

async fn app() -> Router {
    app_with(server_config(), true).await.0
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", KEY);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn remember(app: &Router, zh: &str, en: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/memory/entries",
        Some(json!({ "texts": { "zh": zh, "en": en } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn api_requires_key() {
    let app = app().await;
    let response = app
        .oneshot(
            Request::get("/api/v1/thresholds")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "AUTH_FAILED");
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let app = app().await;
    let response = app
        .oneshot(
            Request::get("/api/v1/status")
                .header("authorization", format!("Bearer {KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_applies_per_key() {
    let config = ServerConfig {
        rate_limit_per_minute: 1,
        ..server_config()
    };
    let (app, _) = app_with(config, true).await;
    let (first, _) = send(&app, "GET", "/api/v1/thresholds", None).await;
    let (second, body) = send(&app, "GET", "/api/v1/thresholds", None).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn remember_then_lookup_returns_strong_candidate() {
    let app = app().await;
    let id = remember(&app, "机器学习", "machine learning").await;
    remember(&app, "深度学习", "deep learning").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/lookup",
        Some(json!({
            "text": "机器学习",
            "source_language": "Chinese",
            "target_language": "en",
            "max_results": 2,
            "include_context": true
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let first = &body["candidates"][0];
    assert_eq!(first["id"], id.as_str());
    assert_eq!(first["target"], "machine learning");
    assert_eq!(first["label"], "strong");
    assert!(body["total"].as_u64().unwrap() <= 2);
    assert!(body["context"]
        .as_str()
        .unwrap()
        .contains("1. 机器学习 → machine learning"));
}

#[tokio::test]
async fn zero_max_results_is_bad_request() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/lookup",
        Some(json!({
            "text": "你好",
            "source_language": "zh",
            "target_language": "en",
            "max_results": 0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MATCH_ERROR");
}

#[tokio::test]
async fn unknown_language_is_rejected() {
    let app = app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/memory/lookup",
        Some(json!({
            "text": "hello",
            "source_language": "klingon",
            "target_language": "en"
        })),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn entry_without_primary_text_is_bad_request() {
    let app = app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/memory/entries",
        Some(json!({ "texts": { "en": "english only" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entry_with_malformed_id_is_bad_request() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/entries",
        Some(json!({ "id": "fixed", "texts": { "zh": "固定", "en": "fixed" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/entries",
        Some(json!({ "id": "12", "texts": { "zh": "十二", "en": "twelve" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["id"], "12");
}

#[tokio::test]
async fn batch_lookup_keeps_input_order() {
    let app = app().await;
    remember(&app, "你好", "hello").await;
    remember(&app, "谢谢", "thank you").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/lookup/batch",
        Some(json!({
            "texts": ["谢谢", "", "你好"],
            "source_language": "zh",
            "target_language": "en",
            "max_results": 1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0][0]["target"], "thank you");
    assert!(results[1].as_array().unwrap().is_empty());
    assert_eq!(results[2][0]["target"], "hello");
}

#[tokio::test]
async fn forget_removes_entry() {
    let app = app().await;
    let id = remember(&app, "再见", "goodbye").await;

    let (status, body) = send(&app, "DELETE", &format!("/api/v1/memory/entries/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (_, body) = send(
        &app,
        "POST",
        "/api/v1/memory/lookup",
        Some(json!({ "text": "再见", "source_language": "zh", "target_language": "en" })),
    )
    .await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn search_reports_cutoff_and_filters_hits() {
    let app = app().await;
    remember(&app, "翻译记忆", "translation memory").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/search",
        Some(json!({
            "text": "翻译记忆",
            "language": "zh",
            "level": "high",
            "use_case": "search"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // high tier 0.90 capped by the search use case at 0.60
    assert!((body["threshold"].as_f64().unwrap() - 0.60).abs() < 1e-6);
    let hits = body["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["text"], "翻译记忆");
    assert!(hits[0]["score"].as_f64().unwrap() >= 0.60);
}

#[tokio::test]
async fn threshold_endpoints() {
    let app = app().await;

    let (status, table) = send(&app, "GET", "/api/v1/thresholds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!((table["table"]["cross_language"]["high"].as_f64().unwrap() - 0.45).abs() < 1e-6);
    let recommended = &table["recommended"];
    assert!((recommended["same_language"]["high"]["translation"].as_f64().unwrap() - 0.90).abs() < 1e-6);
    assert!((recommended["cross_language"]["medium"]["search"].as_f64().unwrap() - 0.40).abs() < 1e-6);

    let (_, rec) = send(
        &app,
        "GET",
        "/api/v1/thresholds/recommended?cross_language=false&level=low&use_case=translation",
        None,
    )
    .await;
    assert!((rec["threshold"].as_f64().unwrap() - 0.85).abs() < 1e-6);

    let (_, rec) = send(
        &app,
        "GET",
        "/api/v1/thresholds/recommended?level=bogus&use_case=recommendation",
        None,
    )
    .await;
    assert!((rec["threshold"].as_f64().unwrap() - 0.70).abs() < 1e-6);

    let (status, label) = send(
        &app,
        "POST",
        "/api/v1/thresholds/classify",
        Some(json!({ "score": 0.62, "cross_language": false, "language": "ja" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(label["label"], "unrelated");
    assert!((label["unrelated_floor"].as_f64().unwrap() - 0.65).abs() < 1e-6);
}

#[tokio::test]
async fn degraded_server_still_answers() {
    let (app, stack) = app_with(server_config(), false).await;
    assert!(!stack.availability().is_available());

    let response = app
        .clone()
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let ready: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ready["status"], "degraded");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/lookup",
        Some(json!({ "text": "你好", "source_language": "zh", "target_language": "en" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/memory/entries",
        Some(json!({ "texts": { "zh": "你好", "en": "hello" } })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["stored"], false);

    let (_, status_body) = send(&app, "GET", "/api/v1/status", None).await;
    assert_eq!(status_body["vector_available"], false);
    assert_eq!(status_body["backend"], "in_memory");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn reprobe_task_restores_availability() {
    let stack = stack(8);
    assert!(!stack.availability().is_available());

    let handle = server::spawn_reprobe(stack.clone(), std::time::Duration::from_millis(20));
    for _ in 0..100 {
        if stack.availability().is_available() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    handle.abort();
    assert!(stack.availability().is_available());
}

#[tokio::test]
async fn serves_over_tcp() {
    let (app, _) = app_with(server_config(), true).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let info: Value = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["name"], "TMKB Server");

    let response = client
        .post(format!("http://{addr}/api/v1/thresholds/classify"))
        .header("x-api-key", KEY)
        .json(&json!({ "score": 0.95, "language": "en" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["label"], "strong");

    server.abort();
}
