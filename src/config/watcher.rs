//! Hot reload of the gateway settings.
//!
//! Only `[gateway]` is live; a change anywhere else in the file is parsed,
//! validated and ignored until restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::resolve_config;
use crate::gateway::{error_chain, FunctionGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    Applied,
    Unchanged,
    Rejected,
}

/// Re-resolve the file (env overrides included) and swap in changed settings.
/// A file that fails to load or validate leaves the current settings in place.
pub fn reload(path: &Path, gateway: &FunctionGateway) -> Reload {
    match resolve_config(Some(path)) {
        Ok(config) if *gateway.settings() == config.gateway => Reload::Unchanged,
        Ok(config) => {
            gateway.update_settings(config.gateway);
            Reload::Applied
        }
        Err(e) => {
            tracing::error!(error = %error_chain(&e), "Config reload rejected, keeping current settings");
            Reload::Rejected
        }
    }
}

/// Watch `path` until the returned handle is dropped.
pub fn watch_settings(
    path: &Path,
    gateway: Arc<FunctionGateway>,
) -> Result<RecommendedWatcher, notify::Error> {
    let target: PathBuf = path.to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                tracing::debug!(path = ?target, "Config file changed");
                reload(&target, &gateway);
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Config watch error"),
        },
        Config::default().with_poll_interval(Duration::from_secs(2)),
    )?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;

    tracing::info!(path = ?path, "Watching config for gateway settings");
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::deployment::DeploymentRegistry;

    fn gateway() -> FunctionGateway {
        let registry = Arc::new(DeploymentRegistry::new(&DeploymentConfig::default()));
        FunctionGateway::new(registry, Default::default())
    }

    #[test]
    fn reload_swaps_only_on_change() {
        let path = std::env::temp_dir().join(format!("gw-reload-{}.toml", uuid::Uuid::new_v4()));
        let gateway = gateway();

        std::fs::write(&path, "[gateway]\nlocal_runtime_url = \"http://127.0.0.1:9100\"\n").unwrap();
        assert_eq!(reload(&path, &gateway), Reload::Applied);
        assert_eq!(gateway.settings().local_runtime_url, "http://127.0.0.1:9100");
        assert_eq!(reload(&path, &gateway), Reload::Unchanged);

        std::fs::write(&path, "[gateway\nlocal_runtime_url = 1").unwrap();
        assert_eq!(reload(&path, &gateway), Reload::Rejected);
        assert_eq!(gateway.settings().local_runtime_url, "http://127.0.0.1:9100");

        std::fs::write(&path, "[gateway]\nlocal_runtime_url = \"not a url\"\n").unwrap();
        assert_eq!(reload(&path, &gateway), Reload::Rejected);
        assert_eq!(gateway.settings().local_runtime_url, "http://127.0.0.1:9100");

        let _ = std::fs::remove_file(&path);
    }
}
