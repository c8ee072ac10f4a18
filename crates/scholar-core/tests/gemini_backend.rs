//! Integration tests for the Gemini backend against an in-process fake of
//! the `generateContent` endpoint. No external network access.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use scholar_core::actions::SUMMARIZE_FAILED;
use scholar_core::generation::{GeminiBackend, backend_from_config};
use scholar_core::{
    ActionPhase, Actions, CapabilityInvoker, Config, CoreError, ExtractedText, GenerationError,
};

#[derive(Debug, Clone)]
struct Recorded {
    model_path: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct Fake {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

async fn generate(
    State(fake): State<Fake>,
    Path(rest): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.seen.lock().unwrap().push(Recorded {
        model_path: rest,
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });
    (fake.status, Json(fake.reply.clone()))
}

/// Start a fake server; returns its `/v1beta` base URL and the request log.
async fn spawn_fake(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v1beta/models/{*rest}", post(generate))
        .with_state(Fake {
            status,
            reply,
            seen: seen.clone(),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1beta", addr), seen)
}

fn candidate(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

fn invoker_for(base_url: String) -> CapabilityInvoker {
    let backend = GeminiBackend::new("test-key".into(), "gemini-2.0-flash".into())
        .with_base_url(base_url);
    CapabilityInvoker::new(Arc::new(backend), &Config::default())
}

#[tokio::test]
async fn summarize_round_trip() {
    let (base, seen) = spawn_fake(StatusCode::OK, candidate(r#"{"summary":"About X."}"#)).await;
    let invoker = invoker_for(base);

    let text = ExtractedText::from("Hello world. This is a test paper about X.");
    let summary = invoker.summarize(&text).await.unwrap();
    assert_eq!(summary, "About X.");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let req = &seen[0];
    assert_eq!(req.model_path, "gemini-2.0-flash:generateContent");
    assert_eq!(req.api_key.as_deref(), Some("test-key"));
    assert_eq!(
        req.body["generationConfig"]["responseMimeType"],
        "application/json"
    );
    assert_eq!(
        req.body["generationConfig"]["responseSchema"]["required"],
        json!(["summary"])
    );
    let prompt = req.body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("This is a test paper about X."));
}

#[tokio::test]
async fn fenced_json_is_accepted() {
    let (base, _) = spawn_fake(
        StatusCode::OK,
        candidate("```json\n{\"answer\": \"Because.\"}\n```"),
    )
    .await;
    let answer = invoker_for(base)
        .chat(&"Paper".into(), "Why?")
        .await
        .unwrap();
    assert_eq!(answer, "Because.");
}

#[tokio::test]
async fn rate_limit_is_one_call_and_a_generic_message() {
    let (base, seen) = spawn_fake(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "quota"}}),
    )
    .await;
    let invoker = invoker_for(base);

    let err = invoker.summarize(&"Paper".into()).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Generation(GenerationError::RateLimited)
    ));

    let result = Actions::new(invoker).handle_summarize("Paper").await;
    assert_eq!(result.phase(), ActionPhase::Failed);
    assert_eq!(result.error(), Some(SUMMARIZE_FAILED));
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn server_error_keeps_status_and_body() {
    let (base, _) = spawn_fake(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": {"message": "boom"}}),
    )
    .await;
    let err = invoker_for(base)
        .summarize(&"Paper".into())
        .await
        .unwrap_err();
    match err {
        CoreError::Generation(GenerationError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn config_base_url_reaches_fake() {
    let (base, seen) = spawn_fake(
        StatusCode::OK,
        candidate(r#"{"suggestions":[{"sectionName":"abstract","suggestion":"Keep it short."}]}"#),
    )
    .await;
    let config = Config {
        api_key: Some("cfg-key".into()),
        model: "gemini-test".into(),
        base_url: Some(base),
        ..Config::default()
    };
    let backend = backend_from_config(&config).unwrap();
    let invoker = CapabilityInvoker::new(backend, &config);

    let suggestions = invoker.suggest_formatting(&"Paper".into()).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].section_name, "abstract");

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].model_path, "gemini-test:generateContent");
    assert_eq!(seen[0].api_key.as_deref(), Some("cfg-key"));
}
