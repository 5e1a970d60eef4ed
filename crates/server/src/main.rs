mod api;
mod cli;
mod router;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::state::AppState;

fn load_config() -> relay_core::Config {
    relay_core::config::load_dotenv();
    relay_core::Config::from_env()
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = router::build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl_c");
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Cli::parse();
    let config = load_config();
    config.log_summary();
    let state = AppState::from_config(config);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Ask { agent, message } => cli::ask(&state, agent.as_deref(), &message).await,
        Command::Agents { prefix } => cli::agents(&state, &prefix).await,
    }
}
