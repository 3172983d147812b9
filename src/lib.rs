//! Function Gateway
//!
//! An application gateway that proxies edge-function calls to a managed
//! deployment or a local runtime, measures every response, and orchestrates
//! the startup and shutdown of the process's long-lived subsystems.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                 FUNCTION GATEWAY                  │
//!                      │                                                   │
//!   Client Request     │  ┌──────────┐   ┌───────────┐   ┌─────────────┐  │
//!   ───────────────────┼─▶│telemetry │──▶│   http    │──▶│   gateway   │──┼──▶ managed deployment
//!                      │  │middleware│   │  server   │   │ (per call   │  │    or local runtime
//!   Client Response    │  └──────────┘   └───────────┘   │  target)    │  │
//!   ◀──────────────────┼───────────────────────────────  └──────┬──────┘  │
//!                      │                                        │         │
//!                      │                               ┌────────▼──────┐  │
//!                      │                               │  deployment   │  │
//!                      │                               │registry + sync│  │
//!                      │                               └───────────────┘  │
//!                      │  ┌─────────────────────────────────────────────┐ │
//!                      │  │ lifecycle: boot order, ordered teardown     │ │
//!                      │  │ subsystems: data store, storage, catalog,   │ │
//!                      │  │   socket hub, notifications, sessions,      │ │
//!                      │  │   timers                                    │ │
//!                      │  │ config · observability                      │ │
//!                      │  └─────────────────────────────────────────────┘ │
//!                      └──────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod deployment;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod subsystems;

pub use config::GatewayConfig;
pub use context::AppContext;
pub use gateway::FunctionGateway;
pub use http::HttpServer;
pub use lifecycle::{boot, Running, Shutdown};
