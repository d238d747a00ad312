//! moorage CLI - shared install workspaces for npm monorepos

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use miette::Diagnostic;
use moorage::ops::GenerateError;
use moorage::util::Shell;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        if let Some(help) = e.downcast_ref::<GenerateError>().and_then(|e| e.help()) {
            eprintln!("help: {}", help);
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("moorage=debug")
    } else {
        EnvFilter::new("moorage=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    ));

    // Execute command
    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, cli.config.as_deref(), shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
