//! Terminal front end for the `tasks` collection.

mod commands;
mod render;
mod transport;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resource_core::{ItemId, PageRequest};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{Command, Runner, Status};
use render::Style;
use transport::UreqTransport;

#[derive(Debug, Parser)]
#[command(name = "tasks", about = "List and edit tasks on a resource server")]
struct Cli {
    /// Base URL of the resource server.
    #[arg(long, env = "API_BASE_URL", default_value = "http://127.0.0.1:3000")]
    api_url: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Show one page of tasks.
    List {
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        per_page: Option<u64>,
    },
    /// Create a task.
    Add {
        name: String,
        #[arg(long)]
        done: bool,
    },
    /// Flip a task between done and not done.
    Toggle { id: ItemId },
    /// Remove a task.
    Delete { id: ItemId },
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::List { page, per_page } => Command::List {
                page: (page.is_some() || per_page.is_some())
                    .then(|| PageRequest::new(page.unwrap_or(1), per_page.unwrap_or(30))),
            },
            CliCommand::Add { name, done } => Command::Add { name, done },
            CliCommand::Toggle { id } => Command::Toggle { id },
            CliCommand::Delete { id } => Command::Delete { id },
        }
    }
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let stdout = io::stdout();
    let style = Style {
        dim_pending: stdout.is_terminal(),
    };
    let transport = UreqTransport::new();
    let mut runner = Runner {
        transport: &transport,
        out: stdout.lock(),
        style,
    };

    let status = runner
        .run(&cli.api_url, cli.command.into())
        .context("failed to write output")?;
    Ok(match status {
        Status::Done => ExitCode::SUCCESS,
        Status::Failed => ExitCode::FAILURE,
    })
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
