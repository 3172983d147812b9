//! Upstream request construction.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri};
use serde_json::Value;
use url::Url;

use crate::gateway::GatewayError;
use crate::http::request::SingleValueHeaders;

/// `{base}/{slug}` plus the original query string.
///
/// The slug becomes exactly one path segment, percent-encoded. The query
/// is appended character for character and only checked by `Uri`, which
/// never rewrites it.
pub fn target_uri(base_url: &str, slug: &str, query: Option<&str>) -> Result<Uri, GatewayError> {
    if slug == "." || slug == ".." {
        return Err(GatewayError::InvalidSlug { slug: slug.to_string() });
    }

    let mut base = Url::parse(base_url).map_err(|source| GatewayError::InvalidBase {
        url: base_url.to_string(),
        source,
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(GatewayError::UnsupportedBase { url: base_url.to_string() });
    }
    base.set_query(None);
    base.set_fragment(None);
    base.path_segments_mut()
        .map_err(|()| GatewayError::UnsupportedBase { url: base_url.to_string() })?
        .pop_if_empty()
        .push(slug);

    let mut raw = String::from(base.as_str());
    if let Some(query) = query {
        raw.push('?');
        raw.push_str(query);
    }
    raw.parse::<Uri>()
        .map_err(|source| GatewayError::InvalidUri { uri: raw, source })
}

/// Host header value for a target: host, plus the port when explicit.
pub fn host_value(uri: &Uri) -> Result<HeaderValue, GatewayError> {
    let host = uri.host().ok_or(GatewayError::InvalidHeader { name: "host" })?;
    let host = match uri.port_u16() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&host).map_err(|_| GatewayError::InvalidHeader { name: "host" })
}

/// Forwarded headers: every single-valued header, with `host` replaced.
///
/// `content-length` and `transfer-encoding` describe the original body,
/// which is re-encoded, so they are recomputed for the upstream request.
pub fn forward_headers(incoming: &SingleValueHeaders, target: &Uri) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming.iter() {
        if name == header::CONTENT_LENGTH || name == header::TRANSFER_ENCODING {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }
    headers.insert(header::HOST, host_value(target)?);
    Ok(headers)
}

/// Upstream body: none for GET/HEAD, otherwise the decoded body as JSON text.
pub fn forward_body(method: &Method, body: &Value) -> Option<String> {
    if method == Method::GET || method == Method::HEAD {
        None
    } else {
        Some(body.to_string())
    }
}

/// Assemble the upstream request. A JSON body gets its own `content-length`.
pub fn upstream_request(
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Option<String>,
) -> Request<Body> {
    let body = match body {
        Some(text) => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(text.len()));
            Body::from(text)
        }
        None => Body::empty(),
    };

    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;
    request
}
