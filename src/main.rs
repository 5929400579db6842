//! Interactive agent over a local directory
//!
//! Reads one line per turn from stdin, runs the agent on it, and prints
//! progress as it goes. `exit`, `quit` or `q` (or EOF) ends the session;
//! Ctrl-C cancels the turn in progress.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use agentbox::agent::{AgentCatalog, AgentEvent, EventSink, LogStyle, Spawner};
use agentbox::config::ModelArgs;
use agentbox::security::CommandGuard;
use agentbox::tracing::{init_tracing, shutdown_tracing};
use agentbox::workspace::{CommandExecutor, Sandbox, Workspace};

#[derive(Parser)]
#[command(name = "agentbox")]
#[command(about = "Tool-calling coding agent for a local workspace")]
#[command(version)]
struct Cli {
    /// Workspace directory the agent operates on
    #[arg(short, long, default_value = ".")]
    workdir: PathBuf,

    #[command(flatten)]
    model: ModelArgs,
}

/// Prints agent events to the terminal
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: AgentEvent) {
        if let AgentEvent::Log { style, text } = event {
            println!("{}", style.paint(&text));
        }
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "q")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("agentbox", cli.model.otlp_endpoint.as_deref())
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialize tracing")?;

    let config = cli.model.agent_config();
    let executor = CommandExecutor::new(
        Duration::from_secs(config.command_timeout_secs),
        CommandGuard::default(),
    );
    let sandbox = Sandbox::new(&cli.workdir)
        .with_context(|| format!("cannot open workspace {}", cli.workdir.display()))?;
    let workspace = Arc::new(Workspace::new(sandbox, executor));
    let client = cli.model.client().context("failed to build model client")?;

    let spawner = Spawner::new(
        client,
        Arc::new(AgentCatalog::default()),
        workspace.clone(),
        config.clone(),
        Arc::new(ConsoleSink),
    );
    let mut agent = spawner.root_agent();

    println!(
        "{} {} ({})",
        "agentbox".bold().cyan(),
        workspace.root().display(),
        config.model
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(">> ".as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit(line) {
            break;
        }

        let cancel = CancellationToken::new();
        agent.set_cancellation(cancel.clone());
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        if let Err(e) = agent.send(line).await {
            ConsoleSink.emit(AgentEvent::error(&e));
        }
        interrupt.abort();
        println!();
    }

    println!("{}", LogStyle::Info.paint("bye"));
    shutdown_tracing();
    Ok(())
}
