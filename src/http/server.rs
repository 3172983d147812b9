//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every route
//! - Wire up middleware (request ID, tracing, body limit, telemetry)
//! - Serve on a bound listener with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::context::AppContext;
use crate::http::request::IncomingRequest;
use crate::http::response::Structured;
use crate::http::websocket::socket_upgrade;
use crate::observability::request_telemetry;
use crate::subsystems::SubsystemState;

const DEFAULT_LOG_LIMIT: usize = 100;

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            router: build_router(ctx),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept connections until `shutdown` resolves, then drain.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server accepting connections");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router. Layers run outermost first: request ID, trace,
/// request ID propagation, body limit, telemetry.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let telemetry = ctx.telemetry.clone();
    let max_body = ctx.config.listener.max_body_size;

    Router::new()
        .route("/functions/{slug}", any(proxy_function))
        .route("/api/logs", get(list_logs))
        .route("/health", get(health))
        .route("/ws", get(socket_upgrade))
        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(DefaultBodyLimit::max(max_body))
                .layer(middleware::from_fn_with_state(telemetry, request_telemetry)),
        )
}

async fn proxy_function(
    State(ctx): State<Arc<AppContext>>,
    Path(slug): Path<String>,
    request: IncomingRequest,
) -> Response {
    ctx.gateway.handle(&slug, &request).await
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

async fn list_logs(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Structured(StatusCode::OK, ctx.log_sink.recent(limit))
}

#[derive(Debug, Serialize)]
struct SubsystemHealth {
    name: &'static str,
    state: SubsystemState,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    subsystems: Vec<SubsystemHealth>,
}

async fn health(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let subsystems: Vec<SubsystemHealth> = ctx
        .startup_subsystems()
        .iter()
        .map(|s| SubsystemHealth {
            name: s.name(),
            state: s.state(),
        })
        .collect();

    let ready = subsystems
        .iter()
        .all(|s| s.state == SubsystemState::Ready);
    let (status, label) = if ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    Structured(
        status,
        HealthBody {
            status: label,
            subsystems,
        },
    )
}
