//! Structured (JSON) response emission.
//!
//! # Responsibilities
//! - Encode a serializable payload as the response body
//! - Attach the encoded size for the telemetry middleware
//! - Shape error bodies consistently (`{error, message, details}`)
//!
//! # Design Decisions
//! - The payload is encoded exactly once; its length is the measured size
//! - A payload that fails to encode yields a 500 and a measured size of 0

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Encoded byte size of a structured payload, read by the telemetry layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSize(pub u64);

/// A JSON response with an explicit status.
#[derive(Debug)]
pub struct Structured<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for Structured<T> {
    fn into_response(self) -> Response {
        let Structured(status, payload) = self;
        let (mut response, size) = match serde_json::to_vec(&payload) {
            Ok(bytes) => {
                let size = bytes.len() as u64;
                let mut response = (status, bytes).into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                (response, size)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode response payload");
                (
                    (StatusCode::INTERNAL_SERVER_ERROR, "response encoding failed").into_response(),
                    0,
                )
            }
        };
        response.extensions_mut().insert(PayloadSize(size));
        response
    }
}

/// Standard error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub fn error_response(
    status: StatusCode,
    error: &'static str,
    message: impl Into<String>,
    details: Option<String>,
) -> Response {
    Structured(
        status,
        ErrorBody {
            error,
            message: message.into(),
            details,
        },
    )
    .into_response()
}
