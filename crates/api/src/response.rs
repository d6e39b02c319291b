//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use telemetry::ComponentHealthReport;

/// Response for `POST /ticks`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub accepted: usize,
    pub message_ids: Vec<String>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl SubmitResponse {
    pub fn new(message_ids: Vec<String>, errors: Vec<String>) -> Self {
        Self {
            success: true,
            accepted: message_ids.len(),
            message_ids,
            timestamp: chrono::Utc::now().timestamp_millis(),
            errors: if errors.is_empty() { None } else { Some(errors) },
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub role: String,
    pub uptime_secs: i64,
    pub queue_connected: bool,
    pub store_connected: bool,
    pub alerts_healthy: bool,
    pub queue_depth: u64,
    pub components: Vec<ComponentHealthReport>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    /// Messages already enqueued when a submission failed partway
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_ids: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
            message_ids: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error carrying the pipeline's error codes.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "TICK_001", msg)
    }

    pub fn unavailable(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::SERVICE_UNAVAILABLE, code, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
    }

    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new("Validation failed", "TICK_001").with_details(errors),
        }
    }
}

impl ApiError {
    /// Reports the ids enqueued before the failure so clients retry only the rest.
    pub fn with_enqueued(mut self, message_ids: Vec<String>) -> Self {
        self.response.message_ids = message_ids;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<tick_core::Error> for ApiError {
    fn from(err: tick_core::Error) -> Self {
        use tick_core::Error;

        match &err {
            Error::MalformedPayload(msg) => ApiError::bad_request(msg),
            Error::QueueSend(_) | Error::QueueReceive(_) => {
                ApiError::unavailable(err.code(), err.to_string())
            }
            _ => ApiError::with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                err.code(),
                err.to_string(),
            ),
        }
    }
}
