use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use scholar_core::html;
use scholar_export::{ExportError, ExportFormat};

use crate::handlers::{error_response, json_body};
use crate::models::ExportRequest;

/// Render reformatted HTML as a downloadable document.
///
/// The submitted HTML is sanitized again; clients may have edited it.
pub async fn export(payload: Result<Json<ExportRequest>, JsonRejection>) -> Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let format = match req.format.parse::<ExportFormat>() {
        Ok(format) => format,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let content = html::sanitize(&req.reformatted_content);

    match scholar_export::export_document(&content, &req.title, format) {
        Ok(bytes) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                format.file_name(&req.title)
            );
            (
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(ExportError::EmptyDocument) => error_response(
            StatusCode::BAD_REQUEST,
            "There is no reformatted content to export.",
        ),
        Err(e) => {
            tracing::error!(error = %e, format = %format, "export failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to export document. Please try again.",
            )
        }
    }
}
