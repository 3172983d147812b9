//! Deployment sync: publish local functions to the managed backend.
//!
//! # Responsibilities
//! - Collect local function definitions from the catalog
//! - POST them to the management API and learn the deployment URL
//! - Retry transient failures with jittered exponential backoff
//! - Record the outcome for the gateway's resolver
//!
//! # Design Decisions
//! - Runs detached; boot never waits on it
//! - Its only error channel is the log (and the recorded outcome)
//! - 4xx answers are final, transport errors, 429 and 5xx are retried

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::DeploymentConfig;
use crate::deployment::registry::{DeploymentRegistry, SyncOutcome};
use crate::gateway::error_chain;
use crate::observability::metrics;
use crate::subsystems::FunctionCatalog;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("management API unreachable")]
    Transport(#[source] reqwest::Error),

    #[error("management API answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed management API response")]
    Decode(#[source] reqwest::Error),

    #[error("management API returned an empty deployment URL")]
    EmptyUrl,
}

impl SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Decode(_) | Self::EmptyUrl => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    project: &'a str,
    functions: Vec<FunctionPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionPayload<'a> {
    slug: &'a str,
    entrypoint: &'a str,
    source: &'a str,
}

#[derive(Debug, Deserialize)]
struct DeployResponse {
    url: String,
}

/// Exponential backoff with up to 10% jitter.
fn retry_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let capped = base_ms
        .saturating_mul(2u64.saturating_pow(attempt - 1))
        .min(max_ms);
    let jitter = match capped / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    };
    Duration::from_millis(capped + jitter)
}

pub struct DeploymentSyncCoordinator {
    client: reqwest::Client,
    config: DeploymentConfig,
    catalog: Arc<FunctionCatalog>,
    registry: Arc<DeploymentRegistry>,
}

impl DeploymentSyncCoordinator {
    pub fn new(
        client: reqwest::Client,
        config: DeploymentConfig,
        catalog: Arc<FunctionCatalog>,
        registry: Arc<DeploymentRegistry>,
    ) -> Self {
        Self {
            client,
            config,
            catalog,
            registry,
        }
    }

    /// Fire and forget. The handle is only useful to tests.
    pub fn spawn(self) -> JoinHandle<SyncOutcome> {
        tokio::spawn(async move { self.sync_deployment().await })
    }

    /// Run one sync to completion and record its outcome.
    pub async fn sync_deployment(&self) -> SyncOutcome {
        let project = self.config.project.as_str();
        let outcome = match (&self.config.api_url, &self.config.api_token) {
            (Some(api_url), Some(token)) if self.registry.can_sync() => {
                match self.publish_with_retry(api_url, token).await {
                    Ok((url, functions)) => SyncOutcome::Deployed { url, functions },
                    Err(e) => SyncOutcome::Failed {
                        error: error_chain(&e),
                    },
                }
            }
            _ => SyncOutcome::Skipped {
                reason: "management API not configured".to_string(),
            },
        };

        match &outcome {
            SyncOutcome::Deployed { url, functions } => {
                tracing::info!(project, url = %url, functions, "Deployment synced")
            }
            SyncOutcome::Skipped { reason } => {
                tracing::info!(project, reason = %reason, "Deployment sync skipped")
            }
            SyncOutcome::Failed { error } => {
                tracing::error!(project, error = %error, "Deployment sync failed, serving via local runtime")
            }
        }
        metrics::record_sync(outcome.label());
        self.registry.record(project, outcome.clone());
        outcome
    }

    async fn publish_with_retry(
        &self,
        api_url: &str,
        token: &str,
    ) -> Result<(String, usize), SyncError> {
        let definitions = self.catalog.definitions();
        let request = DeployRequest {
            project: &self.config.project,
            functions: definitions
                .iter()
                .map(|d| FunctionPayload {
                    slug: &d.slug,
                    entrypoint: &d.entrypoint,
                    source: &d.source,
                })
                .collect(),
        };
        let endpoint = format!(
            "{}/v1/projects/{}/deployments",
            api_url.trim_end_matches('/'),
            self.config.project
        );

        let attempts = self.config.sync_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.publish(&endpoint, token, &request).await {
                Ok(url) => return Ok((url, definitions.len())),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    let delay =
                        retry_delay(attempt, self.config.base_delay_ms, self.config.max_delay_ms);
                    tracing::warn!(
                        attempt,
                        delay = ?delay,
                        error = %error_chain(&e),
                        "Deployment sync attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn publish(
        &self,
        endpoint: &str,
        token: &str,
        request: &DeployRequest<'_>,
    ) -> Result<String, SyncError> {
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(SyncError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status { status, body });
        }

        let deployed: DeployResponse = response.json().await.map_err(SyncError::Decode)?;
        if deployed.url.trim().is_empty() {
            return Err(SyncError::EmptyUrl);
        }
        Ok(deployed.url)
    }
}
