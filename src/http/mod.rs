//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, routes)
//!     → request.rs (single-valued headers, raw query, decoded body)
//!     → gateway / logs / health / websocket.rs handlers
//!     → response.rs (structured JSON bodies with a measured size)
//!     → telemetry layer → client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{IncomingRequest, SingleValueHeaders};
pub use response::{error_response, ErrorBody, PayloadSize, Structured};
pub use server::{build_router, HttpServer};
