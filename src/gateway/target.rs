//! Runtime target selection.
//!
//! # Responsibilities
//! - Ask the deployment resolver for a managed URL on every call
//! - Fall back to the local runtime when none resolves
//!
//! # Design Decisions
//! - No caching: a managed backend appearing or disappearing is seen by
//!   the very next request
//! - An empty URL counts as absent

use serde::Serialize;

/// Which backend serves a proxied call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Managed,
    Local,
}

impl RuntimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Local => "local",
        }
    }
}

/// The backend chosen for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    pub base_url: String,
    pub kind: RuntimeKind,
}

/// Contract offered by the deployment collaborator.
pub trait DeploymentResolver: Send + Sync {
    /// Whether a managed backend is configured at all.
    fn is_configured(&self) -> bool;

    /// The current managed deployment URL, if one is known.
    fn resolve_deployment_url(&self) -> Option<String>;
}

/// Pick exactly one target for a call.
pub fn select_target(resolver: &dyn DeploymentResolver, local_runtime_url: &str) -> RuntimeTarget {
    if resolver.is_configured() {
        if let Some(url) = resolver
            .resolve_deployment_url()
            .filter(|url| !url.trim().is_empty())
        {
            return RuntimeTarget {
                base_url: url,
                kind: RuntimeKind::Managed,
            };
        }
    }

    RuntimeTarget {
        base_url: local_runtime_url.to_string(),
        kind: RuntimeKind::Local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        configured: bool,
        url: Option<&'static str>,
    }

    impl DeploymentResolver for Fixed {
        fn is_configured(&self) -> bool {
            self.configured
        }

        fn resolve_deployment_url(&self) -> Option<String> {
            self.url.map(str::to_string)
        }
    }

    const LOCAL: &str = "http://localhost:7133";

    #[test]
    fn resolved_url_wins_over_local() {
        let resolver = Fixed {
            configured: true,
            url: Some("https://fn.example.dev/v1"),
        };
        assert_eq!(
            select_target(&resolver, LOCAL),
            RuntimeTarget {
                base_url: "https://fn.example.dev/v1".into(),
                kind: RuntimeKind::Managed,
            }
        );
    }

    #[test]
    fn absent_url_selects_local_exactly() {
        let resolver = Fixed {
            configured: true,
            url: None,
        };
        assert_eq!(
            select_target(&resolver, LOCAL),
            RuntimeTarget {
                base_url: LOCAL.into(),
                kind: RuntimeKind::Local,
            }
        );
    }

    #[test]
    fn empty_or_unconfigured_selects_local() {
        let empty = Fixed {
            configured: true,
            url: Some(""),
        };
        assert_eq!(select_target(&empty, LOCAL).kind, RuntimeKind::Local);

        let unconfigured = Fixed {
            configured: false,
            url: Some("https://fn.example.dev"),
        };
        assert_eq!(select_target(&unconfigured, LOCAL).kind, RuntimeKind::Local);
    }
}
