//! Per-request telemetry middleware.
//!
//! # Responsibilities
//! - Measure the emitted byte size of every response without touching it
//! - Measure request duration
//! - Emit one record per request once the body has been fully sent
//! - Skip configured paths (the log-retrieval route)
//!
//! # Design Decisions
//! - Structured responses carry their encoded size as a [`PayloadSize`]
//!   extension; an unencodable payload reports 0
//! - Raw responses are counted frame by frame as they stream out
//! - The record is emitted when the body ends or is dropped, whichever
//!   comes first, so aborted transfers are still logged

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use crate::http::response::PayloadSize;
use crate::observability::log_sink::{LogSink, RequestRecord};
use crate::observability::metrics;

/// Shared middleware state.
#[derive(Clone)]
pub struct Telemetry {
    excluded_paths: Arc<[String]>,
    sink: Arc<LogSink>,
}

impl Telemetry {
    pub fn new(excluded_paths: Vec<String>, sink: Arc<LogSink>) -> Self {
        Self {
            excluded_paths: excluded_paths.into(),
            sink,
        }
    }

    /// True for an excluded path itself and anything below it.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|excluded| {
            let excluded = excluded.trim_end_matches('/');
            match path.strip_prefix(excluded) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }
}

/// What is known about a request before its body has been sent.
struct PendingRecord {
    started: Instant,
    request_id: Option<String>,
    method: String,
    path: String,
    status: u16,
    client_addr: Option<String>,
    user_agent: Option<String>,
}

impl PendingRecord {
    fn complete(self, size: u64) -> RequestRecord {
        RequestRecord {
            timestamp: Utc::now(),
            request_id: self.request_id,
            method: self.method,
            path: self.path,
            status: self.status,
            size,
            duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            client_addr: self.client_addr,
            user_agent: self.user_agent,
        }
    }
}

/// Axum middleware entry point.
pub async fn request_telemetry(
    State(telemetry): State<Telemetry>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if telemetry.is_excluded(&path) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().to_string();
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let user_agent = header_string(&request, USER_AGENT.as_str());
    let request_id = header_string(&request, "x-request-id");

    let response = next.run(request).await;

    let pending = PendingRecord {
        started,
        request_id,
        method,
        path,
        status: response.status().as_u16(),
        client_addr,
        user_agent,
    };
    let known_size = response.extensions().get::<PayloadSize>().map(|s| s.0);

    let (parts, body) = response.into_parts();
    let metered = MeteredBody {
        inner: body,
        counted: 0,
        known_size,
        pending: Some(pending),
        sink: Arc::clone(&telemetry.sink),
    };
    Response::from_parts(parts, Body::new(metered))
}

fn header_string(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Response body wrapper that counts bytes and emits the record at the end.
struct MeteredBody {
    inner: Body,
    counted: u64,
    known_size: Option<u64>,
    pending: Option<PendingRecord>,
    sink: Arc<LogSink>,
}

impl MeteredBody {
    fn finish(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let record = pending.complete(self.known_size.unwrap_or(self.counted));

        tracing::info!(
            target: "telemetry",
            request_id = record.request_id.as_deref().unwrap_or("-"),
            method = %record.method,
            path = %record.path,
            status = record.status,
            size = record.size,
            duration_ms = record.duration_ms,
            client_addr = record.client_addr.as_deref().unwrap_or("-"),
            user_agent = record.user_agent.as_deref().unwrap_or("-"),
            "request completed"
        );
        metrics::record_request(&record);
        self.sink.append(record);
    }
}

impl HttpBody for MeteredBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.counted += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for MeteredBody {
    fn drop(&mut self) {
        self.finish();
    }
}
