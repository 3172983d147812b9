//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to boot, split into per-subsystem sections
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs re-resolves file + env
//!     → validation.rs validates
//!     → changed GatewaySettings swapped into the gateway
//!     → visible to the next proxied request
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only gateway settings are hot-reloadable

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    DeploymentConfig, GatewayConfig, GatewaySettings, ListenerConfig, LogFormat,
    ObservabilityConfig, SessionConfig, StorageConfig, TelemetryConfig,
    DEFAULT_LOCAL_RUNTIME_URL,
};
