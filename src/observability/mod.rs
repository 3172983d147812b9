//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → telemetry.rs (size + duration, emitted after the body is sent)
//!         → tracing event (target "telemetry")
//!         → log_sink.rs (ring buffer behind GET /api/logs)
//!         → metrics.rs (counters, histograms)
//!
//! Process:
//!     → logging.rs (subscriber, filter, pretty or JSON lines)
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing for machine parsing
//! - Request ID (x-request-id) flows into every record
//! - The log-retrieval route is excluded to avoid logging its own reads
//! - Metrics are optional and cheap when no exporter is installed

pub mod log_sink;
pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use log_sink::{LogSink, RequestRecord};
pub use telemetry::{request_telemetry, Telemetry};
