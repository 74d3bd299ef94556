use crate::domain::error::CrudError;
use crate::transport::http::types::{ApiResponse, AppState};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error};

/// Error envelope carrying a stable `code` next to the human-readable message.
pub fn error_response(
    status: StatusCode,
    code: &str,
    entity: &str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: Some(serde_json::json!({ "code": code, "entity": entity })),
            error: Some(message.into()),
        }),
    )
        .into_response()
}

pub fn bad_request(code: &str, entity: &str, message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, entity, message)
}

pub fn not_found(entity: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, "notfound", entity, "Entity not found")
}

pub fn crud_error_response(entity: &str, err: CrudError) -> Response {
    let status = match &err {
        CrudError::Validation { .. } | CrudError::TooLong { .. } | CrudError::NotFound { .. } => {
            StatusCode::BAD_REQUEST
        }
        CrudError::TypeCoercion(_)
        | CrudError::UnsupportedQueryShape(_)
        | CrudError::StorageRejected(_)
        | CrudError::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(entity, error = %err, "request failed");
    } else {
        debug!(entity, error = %err, "request rejected");
    }
    let message = match &err {
        CrudError::NotFound { .. } => "Entity not found".to_string(),
        other => other.to_string(),
    };
    error_response(status, err.error_key(), entity, message)
}

/// `X-<app>-alert: <app>.<entity>.<action>` and `X-<app>-params: <id>`.
pub fn alert_headers(state: &AppState, entity: &str, action: &str, id: i64) -> HeaderMap {
    let app = state.app_name.as_ref();
    let mut headers = HeaderMap::new();
    let pairs = [
        ("alert", format!("{}.{}.{}", app, entity, action)),
        ("params", id.to_string()),
    ];
    for (suffix, value) in pairs {
        let name = HeaderName::try_from(format!("x-{}-{}", app, suffix).to_ascii_lowercase());
        let value = HeaderValue::try_from(value);
        if let (Ok(name), Ok(value)) = (name, value) {
            headers.insert(name, value);
        }
    }
    headers
}
