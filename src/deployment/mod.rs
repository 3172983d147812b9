//! Managed deployment subsystem.
//!
//! # Data Flow
//! ```text
//! boot step 8 (detached):
//!     sync.rs → FunctionCatalog definitions
//!             → POST {api_url}/v1/projects/{project}/deployments
//!             → registry.rs (record {slug, url, last_outcome})
//!
//! every proxied call:
//!     gateway → registry.rs (is_configured, resolve_deployment_url)
//! ```
//!
//! # Design Decisions
//! - The registry is read lock-free on every call (arc-swap)
//! - A pinned `deployment.url` bypasses syncing for resolution
//! - A failed sync never clears a previously known URL

pub mod registry;
pub mod sync;

pub use registry::{DeploymentRecord, DeploymentRegistry, SyncOutcome};
pub use sync::{DeploymentSyncCoordinator, SyncError};
