//! Router tests driven through `tower::ServiceExt::oneshot` with a scripted
//! generation backend.

use std::io::Write;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use scholar_core::generation::{MockGenerator, MockResponse};
use scholar_core::{Actions, CapabilityInvoker, Config, DOCX_MIME};

use crate::build_router;
use crate::state::AppState;

const BOUNDARY: &str = "scholar-test-boundary";

fn app(mock: MockGenerator) -> (axum::Router, Arc<MockGenerator>) {
    app_with_limit(mock, Config::default().max_upload_bytes())
}

fn app_with_limit(mock: MockGenerator, max_upload_bytes: usize) -> (axum::Router, Arc<MockGenerator>) {
    let mock = Arc::new(mock);
    let config = Config::default();
    let state = Arc::new(AppState {
        actions: Actions::new(CapabilityInvoker::new(mock.clone(), &config)),
        max_upload_bytes,
    });
    (build_router(state), mock)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    write!(
        body,
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .unwrap();
    body.extend_from_slice(data);
    write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();

    Request::post("/api/extract")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn docx_package(text: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>"#,
        text
    );
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn health_reports_backend() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "Mock");
}

#[tokio::test]
async fn summarize_success() {
    let (app, mock) = app(MockGenerator::json(json!({"summary": "A short summary."})));
    let response = app
        .oneshot(post_json(
            "/api/summarize",
            json!({"paperText": "Hello world. This is a test paper about X."}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["summary"], "A short summary.");
    assert!(body["error"].is_null());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn empty_paper_is_bad_request_without_backend_call() {
    let (app, mock) = app(MockGenerator::json(json!({"summary": "unused"})));
    let response = app
        .oneshot(post_json("/api/summarize", json!({"paperText": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Paper content cannot be empty.");
    assert!(body["data"].is_null());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn backend_failure_is_bad_gateway_with_generic_message() {
    let (app, _) = app(MockGenerator::new(MockResponse::Status(500)));
    let response = app
        .oneshot(post_json(
            "/api/chat",
            json!({"paperText": "Some paper.", "question": "What is X?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(
        body["error"],
        "Failed to get answer from chatbot. Please try again."
    );
}

#[tokio::test]
async fn suggestions_use_camel_case_fields() {
    let (app, _) = app(MockGenerator::json(json!({
        "suggestions": [{"sectionName": "abstract", "suggestion": "Shorten it."}]
    })));
    let response = app
        .oneshot(post_json(
            "/api/suggest-formatting",
            json!({"paperText": "Abstract. We study X."}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["data"]["suggestions"][0]["sectionName"],
        "abstract"
    );
}

#[tokio::test]
async fn reformat_custom_without_template_is_rejected() {
    let (app, mock) = app(MockGenerator::json(json!({"reformattedContent": "<p>x</p>"})));
    let response = app
        .oneshot(post_json(
            "/api/reformat",
            json!({"paperText": "Paper.", "templateFormat": "Custom"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn reformat_returns_structural_html() {
    let (app, _) = app(MockGenerator::json(json!({
        "reformattedContent": "<html><body><h1 class=\"t\">Title</h1><div><p>Body</p></div></body></html>"
    })));
    let response = app
        .oneshot(post_json(
            "/api/reformat",
            json!({"paperText": "Title. Body.", "templateFormat": "IEEE"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["data"]["reformattedContent"],
        "<h1>Title</h1><p>Body</p>"
    );
}

#[tokio::test]
async fn extract_docx_upload() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(multipart(
            "paper.docx",
            DOCX_MIME,
            &docx_package("A Study of X"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["text"], "A Study of X\n\n");
}

#[tokio::test]
async fn extract_unsupported_type_is_bad_request() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(multipart("notes.txt", "text/plain", b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(
        body["error"],
        "Unsupported file type. Please upload a PDF or DOCX file."
    );
}

#[tokio::test]
async fn extract_corrupt_docx_is_unprocessable() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(multipart("broken.docx", DOCX_MIME, b"not a zip"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], scholar_ingest::UNREADABLE_FILE);
}

#[tokio::test]
async fn export_docx_attachment() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(post_json(
            "/api/export",
            json!({
                "reformattedContent": "<h1>Title</h1><p>Body</p>",
                "format": "docx",
                "title": "My Paper"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"My Paper.docx\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn export_empty_content_is_bad_request() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(post_json(
            "/api/export",
            json!({"reformattedContent": "<div> </div>", "format": "md"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_unknown_format_is_bad_request() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(post_json(
            "/api/export",
            json!({"reformattedContent": "<p>x</p>", "format": "pdf"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_gets_data_error_shape() {
    let (app, mock) = app(MockGenerator::json(json!({"summary": "unused"})));
    let request = Request::post("/api/summarize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["data"].is_null());
    assert_eq!(body["error"], crate::handlers::INVALID_BODY);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn missing_content_type_gets_data_error_shape() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let request = Request::post("/api/chat")
        .body(Body::from(r#"{"paperText": "P", "question": "Q"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], crate::handlers::INVALID_BODY);
}

#[tokio::test]
async fn mistyped_export_body_gets_data_error_shape() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let response = app
        .oneshot(post_json("/api/export", json!({"reformattedContent": 42})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["data"].is_null());
    assert_eq!(body["error"], crate::handlers::INVALID_BODY);
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let (app, _) = app_with_limit(MockGenerator::json(json!({})), 64);
    let mut pdf = b"%PDF-1.7\n".to_vec();
    pdf.resize(4096, b'x');
    let response = app
        .oneshot(multipart("big.pdf", "application/pdf", &pdf))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert!(body["data"].is_null());
    assert_eq!(body["error"], "File is too large (limit 64 bytes).");
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let (app, _) = app(MockGenerator::json(json!({})));
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::post("/api/extract")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "No file uploaded.");
}
