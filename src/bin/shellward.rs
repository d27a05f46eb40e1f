// src/bin/shellward.rs

//! The `shellward` command-line binary.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use shellward::{
    cli::{
        Cli, Commands,
        handlers::{self, commons::CliError},
    },
    constants::INTERRUPTED_EXIT_CODE,
    system::{executor::ExecutionError, settings::Settings},
};

/// The main entry point of the `shellward` application.
/// It sets up logging, parses arguments, dispatches to the correct handler,
/// and performs centralized error handling.
#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()).await {
        // --- Centralized Error Handling ---
        if let Some(CliError::Interrupted) = e.downcast_ref::<CliError>() {
            // Exit silently with the standard code for an interruption.
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);

        // Mirror the child's own exit code so scripts can branch on it.
        if let Some(ExecutionError::Exit(exit)) = e.downcast_ref::<ExecutionError>()
            && let Some(code) = exit.code()
        {
            std::process::exit(code);
        }
        std::process::exit(1);
    }
}

/// Loads the settings and routes to the subcommand handler.
async fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Run(args) => handlers::run::handle(args, &settings).await,
        Commands::Exec(args) => handlers::exec::handle(args, &settings).await,
        Commands::Expand(args) => handlers::expand::handle(args, &settings),
        Commands::Escape(args) => handlers::escape::handle(args),
    }
}
