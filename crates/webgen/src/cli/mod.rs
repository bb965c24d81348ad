//! Webgen cli definition and entrypoint.
mod build;
mod chat;
pub mod ux;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use webgen_core::config::{Config, get_config};

use crate::ext::get_tools;
use crate::log::setup_logging;

/// Webgen - build small web apps by chatting with an AI agent team.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file to use instead of the default one.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model to use for the builder, must be defined in the config.
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Directory where generated projects are written.
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Port used to preview generated projects.
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Show verbose logs.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Chat with the builder agent. This is the default.
    Chat,
    /// Build a web app from a single request and exit.
    Build {
        /// Description of the web app.
        request: Vec<String>,
    },
}

impl Cli {
    /// Applies command line overrides on top of the loaded config.
    fn apply_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(model) = &self.model {
            config.set_builder_model(model)?;
        }
        if let Some(dir) = &self.output_dir {
            config.workspace.output_dir = dir.clone();
        }
        if let Some(port) = self.port {
            config.workspace.port = port;
        }
        Ok(())
    }
}

/// Runs the main CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let log_path = setup_logging().context("Failed to set up logging")?;
        eprintln!("Logging to {}", log_path.display());
    }

    let mut config = get_config(cli.config.clone()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config)?;
    info!(
        model = %config.builder.model.name,
        output_dir = %config.workspace.output_dir.display(),
        "Configuration loaded"
    );

    let available_tools = get_tools(&config).context("Failed to get builtin tools")?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat::execute(&config, &available_tools).await,
        Commands::Build { request } => build::execute(request, &config, &available_tools).await,
    }
}
