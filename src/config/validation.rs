//! Configuration validation.
//!
//! Serde handles the syntax; this module checks values. All errors are
//! collected so an operator sees every problem in one pass.

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be greater than 0"));
    }

    if let Err(message) = check_http_url(&config.gateway.local_runtime_url) {
        errors.push(ValidationError::new("gateway.local_runtime_url", message));
    }
    if config.gateway.upstream_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "gateway.upstream_timeout_secs",
            "must be greater than 0 when set",
        ));
    }

    for path in &config.telemetry.excluded_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                "telemetry.excluded_paths",
                format!("'{}' must start with '/'", path),
            ));
        }
    }
    if config.telemetry.sink_capacity == 0 {
        errors.push(ValidationError::new("telemetry.sink_capacity", "must be greater than 0"));
    }

    if let Some(api_url) = &config.deployment.api_url {
        if let Err(message) = check_http_url(api_url) {
            errors.push(ValidationError::new("deployment.api_url", message));
        }
    }
    if let Some(url) = &config.deployment.url {
        if let Err(message) = check_http_url(url) {
            errors.push(ValidationError::new("deployment.url", message));
        }
    }
    if config.deployment.sync_attempts == 0 {
        errors.push(ValidationError::new("deployment.sync_attempts", "must be at least 1"));
    }

    if config.storage.change_buffer == 0 {
        errors.push(ValidationError::new("storage.change_buffer", "must be greater than 0"));
    }
    if config.sessions.prune_interval_secs == 0 {
        errors.push(ValidationError::new(
            "sessions.prune_interval_secs",
            "must be greater than 0",
        ));
    }
    if config.telemetry.stats_interval_secs == 0 {
        errors.push(ValidationError::new(
            "telemetry.stats_interval_secs",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a URL: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        "http" | "https" => Err(format!("'{}' has no host", raw)),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}
