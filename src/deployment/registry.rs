//! Deployment records and the resolution contract.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DeploymentConfig;
use crate::gateway::DeploymentResolver;

/// Result of the last sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Skipped { reason: String },
    Deployed { url: String, functions: usize },
    Failed { error: String },
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Deployed { .. } => "deployed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// What is known about the managed deployment of this project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRecord {
    pub slug: String,
    pub url: Option<String>,
    pub last_outcome: SyncOutcome,
    pub synced_at: DateTime<Utc>,
}

/// Lock-free holder of the current deployment record.
pub struct DeploymentRegistry {
    configured: bool,
    static_url: Option<String>,
    record: ArcSwapOption<DeploymentRecord>,
}

impl DeploymentRegistry {
    pub fn new(config: &DeploymentConfig) -> Self {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        Self {
            configured: has(&config.api_url) && has(&config.api_token),
            static_url: config.url.clone().filter(|u| !u.trim().is_empty()),
            record: ArcSwapOption::empty(),
        }
    }

    /// Whether the management API can be used for syncing.
    pub fn can_sync(&self) -> bool {
        self.configured
    }

    /// Store the outcome of a sync. A failed sync keeps the previous URL.
    pub fn record(&self, slug: &str, outcome: SyncOutcome) {
        let url = match &outcome {
            SyncOutcome::Deployed { url, .. } => Some(url.clone()),
            SyncOutcome::Skipped { .. } => None,
            SyncOutcome::Failed { .. } => self.current().and_then(|r| r.url.clone()),
        };
        self.record.store(Some(Arc::new(DeploymentRecord {
            slug: slug.to_string(),
            url,
            last_outcome: outcome,
            synced_at: Utc::now(),
        })));
    }

    pub fn current(&self) -> Option<Arc<DeploymentRecord>> {
        self.record.load_full()
    }
}

impl DeploymentResolver for DeploymentRegistry {
    fn is_configured(&self) -> bool {
        self.configured || self.static_url.is_some()
    }

    fn resolve_deployment_url(&self) -> Option<String> {
        if let Some(url) = &self.static_url {
            return Some(url.clone());
        }
        self.current()
            .and_then(|record| record.url.clone())
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn managed_config() -> DeploymentConfig {
        DeploymentConfig {
            api_url: Some("https://api.example.dev".into()),
            api_token: Some("token".into()),
            ..DeploymentConfig::default()
        }
    }

    #[test]
    fn unconfigured_registry_resolves_nothing() {
        let registry = DeploymentRegistry::new(&DeploymentConfig::default());
        assert!(!registry.is_configured());
        assert!(registry.resolve_deployment_url().is_none());
    }

    #[test]
    fn synced_url_resolves_and_survives_failure() {
        let registry = DeploymentRegistry::new(&managed_config());
        assert!(registry.is_configured());
        assert!(registry.resolve_deployment_url().is_none());

        registry.record(
            "default",
            SyncOutcome::Deployed {
                url: "https://default.fn.example.dev".into(),
                functions: 2,
            },
        );
        assert_eq!(
            registry.resolve_deployment_url().as_deref(),
            Some("https://default.fn.example.dev")
        );

        registry.record("default", SyncOutcome::Failed { error: "503".into() });
        let current = registry.current().unwrap();
        assert_eq!(current.last_outcome.label(), "failed");
        assert_eq!(current.url.as_deref(), Some("https://default.fn.example.dev"));
    }

    #[test]
    fn static_url_wins() {
        let config = DeploymentConfig {
            url: Some("https://pinned.example.dev".into()),
            ..DeploymentConfig::default()
        };
        let registry = DeploymentRegistry::new(&config);
        assert!(registry.is_configured());
        assert!(!registry.can_sync());
        assert_eq!(
            registry.resolve_deployment_url().as_deref(),
            Some("https://pinned.example.dev")
        );
    }
}
