//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize every subsystem in dependency order
//! - Bind the listener, then attach what depends on it
//! - Fire the deployment sync without waiting on it
//! - Serve only once every startup subsystem is Ready
//!
//! # Design Decisions
//! - Fail fast: any step's error aborts boot
//! - Steps run one after another, never concurrently
//! - A failed boot tears down whatever already came up

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::context::AppContext;
use crate::deployment::DeploymentSyncCoordinator;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::TeardownReport;
use crate::subsystems::{Subsystem, SubsystemError, SubsystemState};

/// How long in-flight requests get to finish after the trigger.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("boot step '{step}' failed")]
    Step {
        step: &'static str,
        #[source]
        source: SubsystemError,
    },

    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build outbound HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("{name} is {state:?} after boot")]
    NotReady {
        name: &'static str,
        state: SubsystemState,
    },
}

async fn step<F>(name: &'static str, init: F) -> Result<(), BootError>
where
    F: Future<Output = Result<(), SubsystemError>>,
{
    init.await
        .map_err(|source| BootError::Step { step: name, source })?;
    tracing::info!(step = name, "Boot step complete");
    Ok(())
}

/// A booted process: subsystems Ready, listener bound, not yet serving.
pub struct Running {
    ctx: Arc<AppContext>,
    listener: TcpListener,
    server: HttpServer,
}

/// Bring the process up.
pub async fn boot(config: GatewayConfig) -> Result<Running, BootError> {
    let ctx = AppContext::new(config)?;
    match boot_sequence(&ctx).await {
        Ok(listener) => {
            let server = HttpServer::new(ctx.clone());
            Ok(Running {
                ctx,
                listener,
                server,
            })
        }
        Err(e) => {
            ctx.teardown().await;
            Err(e)
        }
    }
}

async fn boot_sequence(ctx: &Arc<AppContext>) -> Result<TcpListener, BootError> {
    step("data_store", ctx.data_store.initialize()).await?;
    step("session_store", ctx.session_store.initialize()).await?;
    step("object_storage", ctx.object_storage.initialize()).await?;
    step("log_sink", ctx.log_sink.initialize()).await?;
    step("function_catalog", ctx.function_catalog.initialize()).await?;

    let addr = ctx.config.listener.bind_address.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| BootError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| BootError::Bind {
        addr: addr.clone(),
        source,
    })?;
    tracing::info!(address = %local_addr, "Listener bound");

    step("socket_hub", ctx.socket_hub.attach(local_addr)).await?;
    step("notification_listener", ctx.notifications.initialize()).await?;
    step("timers", start_timers(ctx)).await?;

    // Advisory only: never awaited.
    DeploymentSyncCoordinator::new(
        ctx.client.clone(),
        ctx.config.deployment.clone(),
        ctx.function_catalog.clone(),
        ctx.registry.clone(),
    )
    .spawn();

    for subsystem in ctx.startup_subsystems() {
        let state = subsystem.state();
        if state != SubsystemState::Ready {
            return Err(BootError::NotReady {
                name: subsystem.name(),
                state,
            });
        }
    }

    Ok(listener)
}

async fn start_timers(ctx: &Arc<AppContext>) -> Result<(), SubsystemError> {
    ctx.timers.initialize().await?;

    let sessions = ctx.session_store.clone();
    ctx.timers.every(
        "session_prune",
        Duration::from_secs(ctx.config.sessions.prune_interval_secs),
        move || {
            let sessions = sessions.clone();
            async move {
                let pruned = sessions.prune_expired();
                if pruned > 0 {
                    tracing::debug!(pruned, remaining = sessions.len(), "Expired sessions pruned");
                }
            }
        },
    )?;

    let sink = ctx.log_sink.clone();
    ctx.timers.every(
        "log_sink_stats",
        Duration::from_secs(ctx.config.telemetry.stats_interval_secs),
        move || {
            let sink = sink.clone();
            async move {
                tracing::info!(
                    buffered = sink.len(),
                    total = sink.total_appended(),
                    "Log sink stats"
                );
            }
        },
    )?;

    Ok(())
}

impl Running {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Serve until the shutdown trigger fires, drain, then tear down.
    pub async fn serve(self) -> TeardownReport {
        let Running {
            ctx,
            listener,
            server,
        } = self;

        let mut drain_rx = ctx.shutdown.subscribe();
        let mut graceful_rx = ctx.shutdown.subscribe();
        let graceful = async move {
            let _ = graceful_rx.recv().await;
        };

        let mut serving = tokio::spawn(server.run(listener, graceful));

        tokio::select! {
            finished = &mut serving => {
                match finished {
                    Ok(Ok(())) => tracing::warn!("HTTP server stopped before shutdown was triggered"),
                    Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
                    Err(e) => tracing::error!(error = %e, "HTTP server task aborted"),
                }
            }
            _ = drain_rx.recv() => {
                tracing::info!(timeout = ?DRAIN_TIMEOUT, "Draining in-flight requests");
                if tokio::time::timeout(DRAIN_TIMEOUT, &mut serving).await.is_err() {
                    tracing::warn!("Drain timed out, dropping remaining connections");
                    serving.abort();
                }
            }
        }

        ctx.teardown().await
    }
}
