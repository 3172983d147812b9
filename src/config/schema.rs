//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Default base URL of the local function runtime.
pub const DEFAULT_LOCAL_RUNTIME_URL: &str = "http://localhost:7133";

/// Root configuration for the gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Function gateway settings.
    pub gateway: GatewaySettings,

    /// Request telemetry settings.
    pub telemetry: TelemetryConfig,

    /// Managed deployment backend.
    pub deployment: DeploymentConfig,

    /// Data store and object storage.
    pub storage: StorageConfig,

    /// Session store.
    pub sessions: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Settings consulted by the function gateway on every proxied call.
///
/// These are the only settings swapped in by a hot reload.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Base URL of the local runtime used when no managed deployment resolves.
    pub local_runtime_url: String,

    /// Upper bound for a single upstream exchange. Unset means no bound.
    pub upstream_timeout_secs: Option<u64>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            local_runtime_url: DEFAULT_LOCAL_RUNTIME_URL.to_string(),
            upstream_timeout_secs: None,
        }
    }
}

/// Request telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Paths never logged (the log-retrieval route and anything below it).
    pub excluded_paths: Vec<String>,

    /// Number of request records kept by the in-process log sink.
    pub sink_capacity: usize,

    /// Interval of the log sink statistics timer in seconds.
    pub stats_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            excluded_paths: vec!["/api/logs".to_string()],
            sink_capacity: 1000,
            stats_interval_secs: 60,
        }
    }
}

/// Managed deployment backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Management API of the hosted execution backend.
    pub api_url: Option<String>,

    /// Bearer token for the management API.
    pub api_token: Option<String>,

    /// Project slug deployments are published under.
    pub project: String,

    /// Pre-existing deployment URL. Takes precedence over synced records.
    pub url: Option<String>,

    /// Directory holding local function definitions.
    pub functions_dir: String,

    /// Maximum number of sync attempts.
    pub sync_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            project: "default".to_string(),
            url: None,
            functions_dir: "functions".to_string(),
            sync_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Data store and object storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Capacity of the data store change feed.
    pub change_buffer: usize,

    /// Root directory for object storage.
    pub object_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            change_buffer: 256,
            object_root: "data/objects".to_string(),
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime in seconds.
    pub ttl_secs: u64,

    /// Interval of the expired-session sweep in seconds.
    pub prune_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 3600,
            prune_interval_secs: 300,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive used when RUST_LOG is unset.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "function_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
