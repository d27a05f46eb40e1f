// src/cli/handlers/exec.rs

//! `shellward exec`.

use crate::{
    cli::{ExecArgs, handlers::commons},
    system::{executor::Command, settings::Settings},
};
use anyhow::{Context, Result};

/// Main entry point for the 'exec' command.
/// Every element after `--` is a template; `--arg` values fill their placeholders in order.
pub async fn handle(args: ExecArgs, settings: &Settings) -> Result<()> {
    let command = Command::new(&args.argv, &args.args)
        .with_context(|| format!("Invalid argument vector {:?}", args.argv))?;
    let command = commons::configure(command, &args.supervision, settings);
    commons::supervise(command, args.supervision.capture).await
}
