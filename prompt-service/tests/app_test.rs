//! End-to-end tests: the service is built from environment configuration and
//! served on a random port, using in-memory storage and the mock provider.

use prompt_service::config::PromptConfig;
use prompt_service::services::init_metrics;
use prompt_service::startup::Application;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

/// Spawn the application on a random port and return its base URL.
async fn spawn_app() -> String {
    std::env::set_var("ENVIRONMENT", "test");
    std::env::set_var("APP__PORT", "0");
    std::env::set_var("STORAGE_BACKEND", "memory");
    std::env::set_var("GENAI_PROVIDER", "mock");

    init_metrics();

    let config = PromptConfig::load().expect("Failed to load config");
    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(app.run_until_stopped());

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let base = spawn_app().await;

    let response = Client::new()
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "prompt-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let base = spawn_app().await;

    let response = Client::new()
        .get(format!("{}/ready", base))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn root_greets() {
    let base = spawn_app().await;

    let body: Value = Client::new()
        .get(&base)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();

    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn generate_round_trip_over_http() {
    let base = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/generate", base))
        .json(&json!({ "prompt": "Say hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let record_id = response
        .headers()
        .get("x-record-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("missing x-record-id");
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["text"], "Mock response for: Say hello");

    let record: Value = client
        .get(format!("{}/generate/{}", base, record_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(record["input_text"], "Say hello");
    assert_eq!(record["output_text"], "Mock response for: Say hello");
}

#[tokio::test]
async fn metrics_are_exposed() {
    let base = spawn_app().await;
    let client = Client::new();

    client
        .post(format!("{}/explain", base))
        .json(&json!({ "code": "print(1)" }))
        .send()
        .await
        .expect("Failed to execute request");

    let response = client
        .get(format!("{}/metrics", base))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let text = response.text().await.unwrap();
    assert!(text.contains("prompt_requests_total"));
    assert!(text.contains("http_requests_total"));
}
