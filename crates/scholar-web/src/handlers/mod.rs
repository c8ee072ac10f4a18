pub mod capabilities;
pub mod export;
pub mod extract;
pub mod health;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scholar_core::{ActionPhase, ActionResult};
use serde::Serialize;

pub const INVALID_BODY: &str = "Invalid request body.";

/// Send an action result as `{data, error}` with a status for its phase.
/// `failed` is the status used when the action ran and failed.
pub fn respond<T: Serialize>(result: ActionResult<T>, failed: StatusCode) -> Response {
    let status = match result.phase() {
        ActionPhase::Succeeded => StatusCode::OK,
        ActionPhase::Rejected => StatusCode::BAD_REQUEST,
        _ => failed,
    };
    (status, Json(result)).into_response()
}

/// A `{data: null, error}` result outside the action layer. Client errors
/// are Rejected, everything else Failed.
fn error_result(status: StatusCode, message: impl Into<String>) -> ActionResult<()> {
    if status.is_client_error() {
        ActionResult::rejected(message)
    } else {
        ActionResult::failure(message)
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(error_result(status, message))).into_response()
}

/// Unwrap a JSON body, turning axum's plain-text rejection into a
/// `{data, error}` response.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::warn!(
                status = %rejection.status(),
                error = %rejection.body_text(),
                "rejected request body"
            );
            Err(error_response(StatusCode::BAD_REQUEST, INVALID_BODY))
        }
    }
}
