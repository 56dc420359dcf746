//! CLI entry point for the kinship Dgraph client.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{fmt, EnvFilter};

use kinship_core::config::{self, LogSettings};
use kinship_graph::{GraphClient, GraphConfig};

use kinship_cli::commands::{self, Command};

#[derive(Parser)]
#[command(name = "kinship")]
#[command(about = "Schema, mutation, query and upsert round trips against Dgraph")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file prefix (default: kinship).
    #[arg(short, long, default_value = "kinship", global = true)]
    config: String,

    /// Override the Dgraph alpha address from config.
    #[arg(long, global = true)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => {
            e.print()?;
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = config::load(&cli.config).context("failed to load configuration")?;
    init_tracing(&settings.log);

    let mut graph_config = GraphConfig::from(&settings.dgraph);
    if let Some(address) = cli.address {
        graph_config.address = address;
    }

    let result = run(&graph_config, &command).await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
    }
    result
}

async fn run(graph_config: &GraphConfig, command: &Command) -> anyhow::Result<()> {
    let client = GraphClient::connect(graph_config)
        .await
        .with_context(|| format!("failed to connect to Dgraph at {}", graph_config.address))?;

    let mut out = std::io::stdout().lock();
    commands::run(&client, command, &mut out).await
}

fn init_tracing(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
