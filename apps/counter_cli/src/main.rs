use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{CountRefresh, SessionEvent};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod host;

use commands::{dispatch, render_session, ShellCommand};
use host::SessionHost;

#[derive(Parser, Debug)]
#[command(about = "Connect a wallet and drive the deployed counter contract")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// JSON-RPC endpoint of the wallet; overrides config and environment.
    #[arg(long)]
    rpc_url: Option<String>,
    #[arg(long, value_parser = parse_count_refresh)]
    count_refresh: Option<CountRefresh>,
    /// Print the session as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    Connect,
    Increment,
    Decrement,
    Reset,
    Count,
    Owner,
    /// Read commands from stdin until `quit`.
    Shell,
}

fn parse_count_refresh(raw: &str) -> Result<CountRefresh, String> {
    raw.parse()
}

impl Command {
    fn as_shell_command(self) -> Option<ShellCommand> {
        match self {
            Command::Connect => Some(ShellCommand::Connect),
            Command::Increment => Some(ShellCommand::Increment),
            Command::Decrement => Some(ShellCommand::Decrement),
            Command::Reset => Some(ShellCommand::Reset),
            Command::Count => Some(ShellCommand::Count),
            Command::Owner => Some(ShellCommand::Owner),
            Command::Shell => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load_settings(&cli.config);
    if let Some(rpc_url) = cli.rpc_url {
        settings.rpc_url = Some(rpc_url);
    }
    if let Some(count_refresh) = cli.count_refresh {
        settings.count_refresh = count_refresh;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let host = SessionHost::start(&settings).await?;

    match cli.command.as_shell_command() {
        Some(command) => {
            let report = dispatch(&host.controller, command).await;
            if let Some(note) = &report.note {
                println!("{note}");
            }
            let session = host.controller.snapshot().await;
            println!("{}", render_session(&session, cli.json));
            if report.failed() {
                bail!(
                    "{}",
                    session
                        .last_error
                        .unwrap_or_else(|| "command failed".to_string())
                );
            }
        }
        None => run_shell(&host, cli.json).await?,
    }

    Ok(())
}

async fn run_shell(host: &SessionHost, as_json: bool) -> Result<()> {
    let mut changes = host.controller.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(SessionEvent::Changed(session)) => {
                    if !session.status.is_busy() {
                        println!("[session] {}", render_session(&session, as_json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("{}", render_session(&host.controller.snapshot().await, as_json));
    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        let report = dispatch(&host.controller, command).await;
        if let Some(note) = report.note {
            println!("{note}");
        }
        match command {
            ShellCommand::Quit => break,
            ShellCommand::Status => {
                println!("{}", render_session(&host.controller.snapshot().await, as_json))
            }
            _ => {}
        }
    }

    printer.abort();
    Ok(())
}
