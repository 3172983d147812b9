//! WebSocket entry point of the socket hub.

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
};

use crate::context::AppContext;
use crate::http::response::error_response;

/// `GET /ws`. Refused with 503 unless the hub is Ready.
pub async fn socket_upgrade(
    State(ctx): State<Arc<AppContext>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let Some(messages) = ctx.socket_hub.subscribe() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "SOCKET_HUB_UNAVAILABLE",
            "Socket hub is not accepting connections",
            None,
        );
    };

    let hub = Arc::clone(&ctx.socket_hub);
    upgrade.on_upgrade(move |socket| hub.serve_client(socket, messages))
}
