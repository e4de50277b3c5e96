//! rollcalld — the rollcall coordinator daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rollcall_core::config::ServerConfig;
use rollcall_services::expiry_loop;

#[derive(Parser)]
#[command(name = "rollcalld", about = "Rollcall coordinator", version)]
struct Cli {
    /// Path to server.toml. Defaults to $ROLLCALL_SERVER_CONFIG or the XDG config dir.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_file = cli.config.unwrap_or_else(ServerConfig::file_path);

    // Load config
    if let Err(e) = ServerConfig::write_default_if_missing(&config_file) {
        tracing::warn!(error = %e, path = %config_file.display(), "failed to write default config");
    }
    let config = ServerConfig::load_from(&config_file)
        .with_context(|| format!("loading {}", config_file.display()))?;
    tracing::info!(
        path = %config_file.display(),
        bind = %config.network.bind,
        port = config.network.port,
        threshold_ms = config.liveness.disconnect_threshold_ms,
        "rollcalld starting"
    );

    let bind = config.network.bind.clone();
    let port = config.network.port;
    let sweep = config.liveness.sweep_interval();
    let state = rollcall_api::ApiState::new(config, Some(config_file)).context("compiling patterns")?;

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let expiry_task = tokio::spawn(expiry_loop(state.registry.clone(), sweep));

    let server_task = tokio::spawn(async move { rollcall_api::serve(state, &bind, port).await });

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
        r = expiry_task             => tracing::error!("expiry task exited: {:?}", r),
        r = server_task             => r.context("http server task")?.context("http server failed")?,
    }

    Ok(())
}
