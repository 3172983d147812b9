use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use function_gateway::config::resolve_config;
use function_gateway::config::watcher::watch_settings;
use function_gateway::gateway::error_chain;
use function_gateway::lifecycle::signals;
use function_gateway::observability::{logging, metrics};
use function_gateway::{boot, AppContext};

#[derive(Debug, Parser)]
#[command(name = "function-gateway", version, about = "Edge function gateway")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from this file, so it is not up yet.
            eprintln!("invalid configuration: {}", error_chain(&e));
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);

    if cli.check {
        tracing::info!("Configuration is valid");
        return ExitCode::SUCCESS;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "function-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        local_runtime_url = %config.gateway.local_runtime_url,
        deployment_api = config.deployment.api_url.is_some(),
        functions_dir = %config.deployment.functions_dir,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let running = match boot(config).await {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(error = %error_chain(&e), "Boot failed");
            return ExitCode::FAILURE;
        }
    };

    let ctx = running.context().clone();
    // Dropping the handle stops hot reload.
    let _watcher = cli.config.as_deref().and_then(|path| {
        watch_settings(path, ctx.gateway.clone())
            .map_err(|e| tracing::warn!(error = %e, "Config hot reload disabled"))
            .ok()
    });
    tokio::spawn(forward_signals(ctx));

    let report = running.serve().await;
    tracing::info!(
        steps = report.steps.len(),
        failures = report.failures(),
        "Shutdown complete"
    );
    ExitCode::SUCCESS
}

/// Every termination signal fires the trigger; repeats only log.
async fn forward_signals(ctx: Arc<AppContext>) {
    loop {
        signals::termination().await;
        if !ctx.shutdown.trigger() {
            tracing::warn!("Shutdown already in progress");
        }
    }
}
