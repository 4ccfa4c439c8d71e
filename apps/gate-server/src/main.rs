use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gate_server::{AppConfig, GateApp, logging};
use tokio_util::sync::CancellationToken;

/// Workspace gate server.
#[derive(Parser)]
#[command(name = "gate-server", version, about)]
struct Cli {
    /// YAML configuration file; `GATE__*` environment variables override it
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Serve HTTP until SIGINT/SIGTERM (default)
    Run,
    /// Load and validate the configuration, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Check => {
            println!("configuration OK");
            Ok(())
        }
        Command::Run => {
            logging::init(&config.logging)?;
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting gate-server");

            let app = GateApp::build(config)?;
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_signal(cancel.clone()));

            app.run(cancel).await?;
            tracing::info!("gate-server stopped");
            Ok(())
        }
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable; waiting for Ctrl+C only");
            wait_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    wait_ctrl_c().await;
}

async fn wait_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
