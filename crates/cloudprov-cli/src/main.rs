//! cloudprov CLI - Command-line interface for cloud provider status
//!
//! Provides commands for:
//! - Listing discovered cloud providers with their name and status
//! - Watching providers and printing every change
//! - Announcing a provider change to the manager
//! - Running the bundled example provider
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand, list::ListCommand, notify::NotifyCommand,
    serve_example::ServeExampleCommand, watch::WatchCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "cloudprov",
    version,
    about = "Inspect and exercise cloud provider status over D-Bus"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List discovered providers once
    List(ListCommand),
    /// Print the provider table every time something changes
    Watch(WatchCommand),
    /// Send CloudProviderChanged to the manager
    Notify(NotifyCommand),
    /// Run the example cloud provider
    ServeExample(ServeExampleCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config_path = commands::resolve_config_path(cli.config);

    match cli.command {
        Commands::List(cmd) => cmd.execute(&config_path, format).await,
        Commands::Watch(cmd) => cmd.execute(&config_path, format).await,
        Commands::Notify(cmd) => cmd.execute(&config_path, format).await,
        Commands::ServeExample(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}
