//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     data store → sessions → object storage → log sink → function catalog
//!     → bind listener → socket hub → notification listener → timers
//!     → deployment sync (detached) → serve
//!
//! Shutdown (shutdown.rs):
//!     trigger → stop accepting → drain (bounded) → ordered teardown → exit 0
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger; repeated signals only log
//! ```
//!
//! # Design Decisions
//! - Traffic is accepted only after every startup subsystem is Ready
//! - Teardown steps are isolated from one another
//! - Any boot failure exits with status 1

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, TeardownReport, TeardownStep};
pub use startup::{boot, BootError, Running};
