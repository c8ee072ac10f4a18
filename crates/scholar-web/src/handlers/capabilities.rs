use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;

use crate::handlers::{json_body, respond};
use crate::models::{ChatRequest, PaperRequest, ReformatRequest};
use crate::state::AppState;

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PaperRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let result = state.actions.handle_summarize(&req.paper_text).await;
    respond(result, StatusCode::BAD_GATEWAY)
}

pub async fn suggest_formatting(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PaperRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let result = state
        .actions
        .handle_suggest_formatting(&req.paper_text)
        .await;
    respond(result, StatusCode::BAD_GATEWAY)
}

pub async fn reformat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReformatRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let result = state
        .actions
        .handle_reformat(
            &req.paper_text,
            req.template_format.as_deref(),
            req.custom_template_content.as_deref(),
        )
        .await;
    respond(result, StatusCode::BAD_GATEWAY)
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let result = state
        .actions
        .handle_chat(&req.paper_text, &req.question)
        .await;
    respond(result, StatusCode::BAD_GATEWAY)
}
