//! Long-lived process subsystems.
//!
//! # Data Flow
//! ```text
//! boot (lifecycle/startup.rs)
//!     → data_store.rs       (change feed opened)
//!     → session_store.rs    (session table)
//!     → object_storage.rs   (root directory)
//!     → observability::log_sink
//!     → function_catalog.rs (local function definitions)
//!     → [listener bound]
//!     → socket_hub.rs       (attached to the bound address)
//!     → notifications.rs    (data store feed → socket hub)
//!     → timers.rs           (interval tasks)
//!
//! teardown (lifecycle/shutdown.rs):
//!     notifications → socket hub → sessions → timers → remaining in reverse
//! ```
//!
//! # Design Decisions
//! - One trait for every subsystem so the orchestrator treats them alike
//! - State moves Uninitialized → Ready → Closed and never back
//! - Closing twice is a no-op, never an error
//! - Each instance is owned by the process context, no global lookup

pub mod data_store;
pub mod function_catalog;
pub mod notifications;
pub mod object_storage;
pub mod session_store;
pub mod socket_hub;
pub mod timers;

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde::Serialize;

pub use data_store::{ChangeEvent, ChangeOperation, DataStore};
pub use function_catalog::{FunctionCatalog, FunctionDefinition};
pub use notifications::NotificationListener;
pub use object_storage::ObjectStorage;
pub use session_store::{Session, SessionStore};
pub use socket_hub::SocketHub;
pub use timers::TimerRegistry;

/// Lifecycle state of a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemState {
    Uninitialized,
    Ready,
    Closed,
}

impl SubsystemState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Ready,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Ready => 1,
            Self::Closed => 2,
        }
    }
}

/// Errors raised by subsystem lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SubsystemError {
    #[error("{name}: cannot initialize from state {from:?}")]
    InvalidTransition {
        name: &'static str,
        from: SubsystemState,
    },

    #[error("{name} is not ready")]
    NotReady { name: &'static str },

    #[error("{name} requires {dependency}, which is not ready")]
    DependencyNotReady {
        name: &'static str,
        dependency: &'static str,
    },

    #[error("{name}: I/O failure")]
    Io {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{name}: {message}")]
    Failed { name: &'static str, message: String },
}

/// Result of asking a state cell to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTransition {
    /// Ready → Closed. The caller releases resources.
    Closed,
    /// Already closed; nothing to do.
    AlreadyClosed,
    /// Never initialized; nothing to release.
    NeverStarted,
}

/// Atomic lifecycle cell shared by every subsystem implementation.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SubsystemState::Uninitialized.as_u8()))
    }

    pub fn get(&self) -> SubsystemState {
        SubsystemState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.get() == SubsystemState::Ready
    }

    /// Uninitialized → Ready. Any other starting state is an error.
    pub fn mark_ready(&self, name: &'static str) -> Result<(), SubsystemError> {
        self.0
            .compare_exchange(
                SubsystemState::Uninitialized.as_u8(),
                SubsystemState::Ready.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(|raw| SubsystemError::InvalidTransition {
                name,
                from: SubsystemState::from_u8(raw),
            })
    }

    /// Ready → Closed. Closed stays Closed; Uninitialized is left untouched.
    pub fn mark_closed(&self) -> CloseTransition {
        match self.0.compare_exchange(
            SubsystemState::Ready.as_u8(),
            SubsystemState::Closed.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => CloseTransition::Closed,
            Err(raw) if SubsystemState::from_u8(raw) == SubsystemState::Closed => {
                CloseTransition::AlreadyClosed
            }
            Err(_) => CloseTransition::NeverStarted,
        }
    }

    pub fn ensure_ready(&self, name: &'static str) -> Result<(), SubsystemError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(SubsystemError::NotReady { name })
        }
    }
}

/// A process-wide service with an initialize/close lifecycle.
#[async_trait]
pub trait Subsystem: Send + Sync {
    /// Stable name used in logs and health output.
    fn name(&self) -> &'static str;

    fn state(&self) -> SubsystemState;

    /// Bring the subsystem to Ready.
    async fn initialize(&self) -> Result<(), SubsystemError>;

    /// Release resources. Must tolerate repeated calls.
    async fn close(&self) -> Result<(), SubsystemError>;
}
