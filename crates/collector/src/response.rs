//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use footprint_core::{StoreErrorCode, ValidationErrorCode};
use serde::{Deserialize, Serialize};
use telemetry::MetricsSnapshot;

/// Response to `POST /api/analytics/batch`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub received: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl BatchResponse {
    pub fn success(received: usize) -> Self {
        Self {
            success: true,
            received,
            rejected: 0,
            errors: None,
        }
    }

    /// Some events were rejected; the rest were stored.
    pub fn partial(received: usize, errors: Vec<String>) -> Self {
        Self {
            success: true,
            received,
            rejected: errors.len(),
            errors: if errors.is_empty() { None } else { Some(errors) },
        }
    }
}

/// Response to `/api/analytics/track`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub events_stored: usize,
    pub metrics: MetricsSnapshot,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error with a response code.
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
        Self::with_code(
            StatusCode::BAD_REQUEST,
            ValidationErrorCode::InvalidFormat.code(),
            msg,
        )
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::validation(ValidationErrorCode::InvalidQuery.code(), vec![msg.into()])
    }

    pub fn bad_gateway(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_GATEWAY, code, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            StoreErrorCode::WriteFailed.code(),
            msg,
        )
    }

    pub fn validation(code: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new("Validation failed", code).with_details(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<footprint_core::Error> for ApiError {
    fn from(err: footprint_core::Error) -> Self {
        use footprint_core::Error;

        match &err {
            Error::ValidationWithCode { code, message, .. } => {
                ApiError::validation(*code, vec![message.clone()])
            }
            Error::Store {
                code,
                message,
                http_status,
            } => {
                let status = StatusCode::from_u16(*http_status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                ApiError::with_code(status, *code, message)
            }
            Error::Validation(msg) => ApiError::bad_request(msg),
            Error::Serialization(e) => ApiError::bad_request(e.to_string()),
            Error::Lookup(msg) => ApiError::bad_gateway("GEO_001", msg),
            Error::Render(msg) => {
                ApiError::with_code(StatusCode::INTERNAL_SERVER_ERROR, "RENDER_001", msg)
            }
            _ => ApiError::internal(err.to_string()),
        }
    }
}
