//! Function gateway.
//!
//! # Data Flow
//! ```text
//! ALL /functions/{slug}
//!     → http/request.rs (IncomingRequest: single-valued headers, raw query, decoded body)
//!     → target.rs (managed deployment URL, else local runtime)
//!     → forward.rs (slug as one encoded segment, raw query, header copy + host override, JSON body)
//!     → hyper client behind Decompression (upstream exchange, body buffered and decoded)
//!     → relay.rs (status + filtered headers + bytes, CORS forced)
//!     → on any failure: 502 {error: "GATEWAY_ERROR", message, details}
//! ```
//!
//! # Design Decisions
//! - Target chosen fresh per call, never cached
//! - Upstream target is an `http::Uri`, so the query goes out byte for byte
//! - Whole upstream body buffered in memory (bounded payloads only)
//! - No upstream timeout unless `gateway.upstream_timeout_secs` is set
//! - Nothing escapes `handle`: every error becomes the 502 body

pub mod forward;
pub mod relay;
pub mod target;

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::{self, Body},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tower::{Layer, ServiceExt};
use tower_http::decompression::{Decompression, DecompressionLayer};

use crate::config::GatewaySettings;
use crate::http::request::IncomingRequest;
use crate::http::response::error_response;
use crate::observability::metrics;

pub use relay::{ProxiedResponse, EXCLUDED_RESPONSE_HEADERS};
pub use target::{select_target, DeploymentResolver, RuntimeKind, RuntimeTarget};

/// Failures between target resolution and the last upstream byte.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid target URL '{url}'")]
    InvalidBase {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target URL '{url}' cannot carry a function path")]
    UnsupportedBase { url: String },

    #[error("'{slug}' is not a function name")]
    InvalidSlug { slug: String },

    #[error("invalid upstream URI '{uri}'")]
    InvalidUri {
        uri: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("invalid value for header '{name}'")]
    InvalidHeader { name: &'static str },

    #[error("upstream request failed")]
    Transport(#[source] hyper_util::client::legacy::Error),

    #[error("failed to read upstream response")]
    Body(#[source] axum::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Render an error and its sources as one line.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// The fixed 502 response for any gateway failure.
pub fn gateway_error_response(error: &GatewayError) -> Response {
    error_response(
        StatusCode::BAD_GATEWAY,
        "GATEWAY_ERROR",
        "Failed to proxy request to function runtime",
        Some(error_chain(error)),
    )
}

/// Pooled upstream client. Response bodies are decoded before relay.
pub type UpstreamClient = Decompression<Client<HttpsConnector<HttpConnector>, Body>>;

/// Plain `http://` for the local runtime, TLS for managed deployments.
pub fn upstream_client() -> UpstreamClient {
    let connector = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    let client = Client::builder(TokioExecutor::new()).build(connector);
    DecompressionLayer::new().layer(client)
}

pub struct FunctionGateway {
    client: UpstreamClient,
    resolver: Arc<dyn DeploymentResolver>,
    settings: ArcSwap<GatewaySettings>,
}

impl FunctionGateway {
    pub fn new(resolver: Arc<dyn DeploymentResolver>, settings: GatewaySettings) -> Self {
        Self {
            client: upstream_client(),
            resolver,
            settings: ArcSwap::from_pointee(settings),
        }
    }

    /// Swap in new settings; the next call observes them.
    pub fn update_settings(&self, settings: GatewaySettings) {
        tracing::info!(
            local_runtime_url = %settings.local_runtime_url,
            upstream_timeout_secs = ?settings.upstream_timeout_secs,
            "Gateway settings updated"
        );
        self.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> Arc<GatewaySettings> {
        self.settings.load_full()
    }

    pub fn select_target(&self) -> RuntimeTarget {
        select_target(self.resolver.as_ref(), &self.settings.load().local_runtime_url)
    }

    /// Proxy one call. Never fails: errors become a 502 response.
    pub async fn handle(&self, slug: &str, request: &IncomingRequest) -> Response {
        match self.proxy(slug, request).await {
            Ok((kind, proxied)) => {
                metrics::record_proxy(kind.as_str(), "ok");
                proxied.into_response()
            }
            Err((kind, e)) => {
                tracing::warn!(
                    slug,
                    target = kind.as_str(),
                    error = %error_chain(&e),
                    "Function gateway error"
                );
                metrics::record_proxy(kind.as_str(), "error");
                gateway_error_response(&e)
            }
        }
    }

    async fn proxy(
        &self,
        slug: &str,
        request: &IncomingRequest,
    ) -> Result<(RuntimeKind, ProxiedResponse), (RuntimeKind, GatewayError)> {
        let settings = self.settings.load_full();
        let target = select_target(self.resolver.as_ref(), &settings.local_runtime_url);
        let kind = target.kind;

        let exchange = self.exchange(&target, slug, request);
        let result = match settings.upstream_timeout_secs {
            Some(secs) => {
                let limit = Duration::from_secs(secs);
                tokio::time::timeout(limit, exchange)
                    .await
                    .unwrap_or(Err(GatewayError::Timeout(limit)))
            }
            None => exchange.await,
        };
        result.map(|r| (kind, r)).map_err(|e| (kind, e))
    }

    async fn exchange(
        &self,
        target: &RuntimeTarget,
        slug: &str,
        request: &IncomingRequest,
    ) -> Result<ProxiedResponse, GatewayError> {
        let uri = forward::target_uri(&target.base_url, slug, request.query.as_deref())?;
        let headers = forward::forward_headers(&request.headers, &uri)?;
        let payload = forward::forward_body(&request.method, &request.body);

        tracing::debug!(
            slug,
            method = %request.method,
            target = target.kind.as_str(),
            uri = %uri,
            "Proxying function call"
        );

        let upstream = forward::upstream_request(request.method.clone(), uri, headers, payload);
        let response = self
            .client
            .clone()
            .oneshot(upstream)
            .await
            .map_err(GatewayError::Transport)?;
        let (parts, upstream_body) = response.into_parts();
        let bytes = body::to_bytes(Body::new(upstream_body), usize::MAX)
            .await
            .map_err(GatewayError::Body)?;

        Ok(ProxiedResponse::new(parts.status, &parts.headers, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[test]
    fn chain_includes_sources() {
        let err = forward::target_uri("nope", "x", None).unwrap_err();
        let text = error_chain(&err);
        assert!(text.starts_with("invalid target URL 'nope': "));
    }

    #[tokio::test]
    async fn error_response_shape() {
        let err = GatewayError::Timeout(Duration::from_secs(3));
        let response = gateway_error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "GATEWAY_ERROR");
        assert_eq!(json["details"], "upstream did not respond within 3s");
        assert!(json["message"].is_string());
    }
}
