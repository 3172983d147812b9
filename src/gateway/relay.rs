//! Upstream response relay.

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Headers never copied from the upstream response.
///
/// The body is fully buffered and already decoded, so the original framing
/// and encoding headers no longer describe it.
pub const EXCLUDED_RESPONSE_HEADERS: [HeaderName; 4] = [
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::CONTENT_ENCODING,
];

/// An upstream response ready to be relayed unchanged.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxiedResponse {
    pub fn new(status: StatusCode, upstream_headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: relay_headers(upstream_headers),
            body,
        }
    }
}

/// Copy upstream headers minus the excluded set, then force open CORS.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(upstream.len() + 1);
    for (name, value) in upstream.iter() {
        if EXCLUDED_RESPONSE_HEADERS.contains(name) {
            continue;
        }
        // append keeps repeated headers such as set-cookie
        relayed.append(name.clone(), value.clone());
    }
    relayed.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    relayed
}

impl IntoResponse for ProxiedResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        // Upstream headers replace the defaults; framing comes from the body.
        *response.headers_mut() = self.headers;
        response
    }
}
