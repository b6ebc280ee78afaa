use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use brewline_core::DomainError;
use brewline_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        ServiceError::AlreadyClosed(_) => json_error(StatusCode::CONFLICT, "already_closed", err.to_string()),
        ServiceError::InsufficientInventory(_) => {
            json_error(StatusCode::CONFLICT, "insufficient_inventory", err.to_string())
        }
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Transaction(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "the operation failed and was rolled back; it is safe to retry",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path id into one of the typed id newtypes.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn invalid_query(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_query", message)
}
