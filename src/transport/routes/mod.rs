use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::common::errors::GameError;

pub mod room_routes;
pub mod stats_routes;

/// JSON error envelope for every failed operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// HTTP status code.
    pub status: u16,
    /// Tagged error code, e.g. `ROOM_NOT_FOUND`.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl IntoResponse for GameError {
    fn into_response(self) -> axum::response::Response {
        let status = self.code.http_status();
        let body = ApiError {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            status,
            error: self.code.as_str().to_string(),
            message: self.message,
            retry_after_ms: self.retry_after_ms,
        };
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response()
    }
}
