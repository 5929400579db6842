//! Multi-session agent service
//!
//! Each uploaded project becomes a session with its own workspace under
//! `--workspaces`; clients drive the session's agent over `/ws/:id`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use agentbox::agent::AgentCatalog;
use agentbox::config::ModelArgs;
use agentbox::server::{create_router, AppState, SessionManager};
use agentbox::tracing::{init_tracing, shutdown_tracing};

#[derive(Parser)]
#[command(name = "agentbox-server")]
#[command(about = "Websocket service running one coding agent per session")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "AGENTBOX_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Directory holding one subdirectory per session
    #[arg(long, env = "AGENTBOX_WORKSPACES", default_value = "workspaces")]
    workspaces: PathBuf,

    /// Seconds an uploaded session may wait for its first client
    #[arg(long, env = "AGENTBOX_UNCLAIMED_TIMEOUT", default_value_t = 600)]
    unclaimed_timeout: u64,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("agentbox-server", cli.model.otlp_endpoint.as_deref())
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialize tracing")?;

    // Log lines are sent to browsers, which render ANSI colour codes
    colored::control::set_override(true);

    let client = cli.model.client().context("failed to build model client")?;
    let sessions = SessionManager::new(
        &cli.workspaces,
        client,
        Arc::new(AgentCatalog::default()),
        cli.model.agent_config(),
    )
    .with_context(|| format!("cannot use workspaces dir {}", cli.workspaces.display()))?;

    info!(
        bind = %cli.bind,
        workspaces = %sessions.base_dir().display(),
        model = %cli.model.model,
        "Starting agentbox server"
    );

    let sessions = Arc::new(sessions);
    let reaper = {
        let sessions = sessions.clone();
        let max_idle = Duration::from_secs(cli.unclaimed_timeout);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tick.tick().await;
                sessions.reap_unclaimed(max_idle);
            }
        })
    };

    let app = create_router(AppState { sessions });
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("server error")?;

    reaper.abort();
    shutdown_tracing();
    Ok(())
}
