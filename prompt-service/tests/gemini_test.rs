//! Gemini provider tests against a local fake of the `generateContent` API.

use axum::extract::{Path, Query, State};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use prompt_service::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use prompt_service::services::providers::{GenerationParams, ProviderError, TextProvider};
use prompt_service::services::InMemoryRecordStore;
use prompt_service::startup::{build_router, AppState};
use secrecy::Secret;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

#[derive(Clone)]
struct FakeGemini {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<(String, String, Value)>>>,
}

async fn generate_content(
    State(fake): State<FakeGemini>,
    Path(call): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let key = query.get("key").cloned().unwrap_or_default();
    fake.seen.lock().unwrap().push((call, key, body));
    (fake.status, Json(fake.reply.clone()))
}

async fn list_models(State(fake): State<FakeGemini>) -> impl IntoResponse {
    (fake.status, Json(json!({ "models": [] })))
}

/// Serve the fake and return a provider pointed at it, plus the request log.
async fn provider_against(
    status: StatusCode,
    reply: Value,
) -> (GeminiTextProvider, Arc<Mutex<Vec<(String, String, Value)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let fake = FakeGemini {
        status,
        reply,
        seen: seen.clone(),
    };

    let router = Router::new()
        .route("/v1beta/models", get(list_models))
        .route("/v1beta/models/:call", post(generate_content))
        .with_state(fake);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { axum::serve(listener, router).await });

    let provider = GeminiTextProvider::new(GeminiConfig {
        api_key: Secret::new("test-key".to_string()),
        model: "gemini-2.0-flash".to_string(),
        api_base: format!("http://127.0.0.1:{}/v1beta", port),
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    (provider, seen)
}

#[tokio::test]
async fn sends_prompt_and_concatenates_parts() {
    let (provider, seen) = provider_against(
        StatusCode::OK,
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello" }, { "text": " world" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 2, "candidatesTokenCount": 3 }
        }),
    )
    .await;

    let params = GenerationParams {
        temperature: Some(0.5),
        max_tokens: Some(256),
    };
    let response = provider.generate("Say hello", &params).await.unwrap();

    assert_eq!(response.text.as_deref(), Some("Hello world"));
    assert_eq!(response.input_tokens, 2);
    assert_eq!(response.output_tokens, 3);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (call, key, body) = &seen[0];
    assert_eq!(call, "gemini-2.0-flash:generateContent");
    assert_eq!(key, "test-key");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Say hello");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
}

#[tokio::test]
async fn no_candidates_yields_no_text() {
    let (provider, _) = provider_against(StatusCode::OK, json!({ "candidates": [] })).await;

    let response = provider
        .generate("Say hello", &GenerationParams::default())
        .await
        .unwrap();

    assert!(response.text.is_none());
}

#[tokio::test]
async fn rate_limit_is_reported() {
    let (provider, _) = provider_against(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "code": 429, "message": "Resource exhausted" } }),
    )
    .await;

    let err = provider
        .generate("Say hello", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::RateLimited));
}

#[tokio::test]
async fn server_error_is_api_error() {
    let (provider, _) = provider_against(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "code": 500, "message": "backend exploded" } }),
    )
    .await;

    let err = provider
        .generate("Say hello", &GenerationParams::default())
        .await
        .unwrap_err();

    match err {
        ProviderError::ApiError(msg) => {
            assert!(msg.contains("500"));
            assert!(!msg.contains("backend exploded"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn blocked_prompt_is_content_filtered() {
    let (provider, _) = provider_against(
        StatusCode::OK,
        json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
    )
    .await;

    let err = provider
        .generate("something blocked", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ContentFiltered));
}

#[tokio::test]
async fn unreachable_api_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let provider = GeminiTextProvider::new(GeminiConfig {
        api_key: Secret::new("test-key".to_string()),
        model: "gemini-2.0-flash".to_string(),
        api_base: format!("http://127.0.0.1:{}/v1beta", port),
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    let err = provider
        .generate("Say hello", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NetworkError(_)));
}

async fn readiness_with(provider: GeminiTextProvider) -> StatusCode {
    let state = AppState::new(
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(provider),
        GenerationParams::default(),
        Duration::from_secs(5),
    );
    let router = build_router(state, &["*".to_string()]);

    let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn readiness_follows_provider_health() {
    let (healthy, _) = provider_against(StatusCode::OK, json!({})).await;
    assert!(healthy.health_check().await.is_ok());
    assert_eq!(readiness_with(healthy).await, StatusCode::OK);

    let (failing, _) = provider_against(StatusCode::FORBIDDEN, json!({})).await;
    assert!(matches!(
        failing.health_check().await,
        Err(ProviderError::ApiError(_))
    ));
    assert_eq!(readiness_with(failing).await, StatusCode::SERVICE_UNAVAILABLE);
}
