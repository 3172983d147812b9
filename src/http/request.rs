//! Incoming request normalization.
//!
//! # Responsibilities
//! - Keep only single-valued headers, in arrival order
//! - Capture the raw query string untouched
//! - Decode the body once (JSON, form, or empty object)
//!
//! # Design Decisions
//! - Normalization happens in an extractor, so the gateway only ever sees
//!   an immutable [`IncomingRequest`]
//! - A header repeated on the wire is dropped entirely
//! - Bodies that are neither JSON nor form-encoded decode to `{}`

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

use crate::http::response::error_response;

/// Ordered header mapping holding exactly one value per name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleValueHeaders(Vec<(HeaderName, HeaderValue)>);

impl SingleValueHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut kept = Vec::with_capacity(headers.keys_len());
        for name in headers.keys() {
            let mut values = headers.get_all(name).iter();
            match (values.next(), values.next()) {
                (Some(value), None) => kept.push((name.clone(), value.clone())),
                _ => tracing::trace!(header = %name, "Dropping multi-valued header"),
            }
        }
        Self(kept)
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.0
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.0.iter().map(|(n, v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A request as seen by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    pub method: Method,
    pub path: String,
    pub headers: SingleValueHeaders,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    /// Body already decoded by [`decode_body`].
    pub body: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum BodyDecodeError {
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a request body according to its content type.
pub fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Value, BodyDecodeError> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if essence == "application/json" || essence.ends_with("+json") {
        return Ok(serde_json::from_slice(bytes)?);
    }

    if essence == "application/x-www-form-urlencoded" {
        let fields = url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect::<Map<_, _>>();
        return Ok(Value::Object(fields));
    }

    Ok(Value::Object(Map::new()))
}

impl<S> FromRequest<S> for IncomingRequest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);
        let headers = SingleValueHeaders::from_header_map(req.headers());
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Respects the router's body limit.
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let body = decode_body(content_type.as_deref(), &bytes).map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, "INVALID_BODY", e.to_string(), None)
        })?;

        Ok(Self {
            method,
            path,
            headers,
            query,
            body,
        })
    }
}
