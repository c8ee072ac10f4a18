use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;

use scholar_ingest::UNREADABLE_FILE;

use crate::handlers::{error_response, respond};
use crate::state::AppState;
use crate::upload;

pub async fn extract(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let file = match upload::parse_multipart(multipart, state.max_upload_bytes).await {
        Ok(file) => file,
        Err(e) => return error_response(e.status(), e.message()),
    };
    let doc = file.into_document();
    tracing::info!(
        filename = doc.filename().unwrap_or(""),
        media_type = doc.media_type().label(),
        bytes = doc.bytes().len(),
        "extracting upload"
    );

    // MuPDF parsing is blocking work.
    match tokio::task::spawn_blocking(move || scholar_ingest::handle_extract(&doc)).await {
        Ok(result) => respond(result, StatusCode::UNPROCESSABLE_ENTITY),
        Err(e) => {
            tracing::error!(error = %e, "extraction task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, UNREADABLE_FILE)
        }
    }
}
