// src/cli/handlers/run.rs

//! `shellward run`.

use crate::{
    cli::{RunArgs, handlers::commons},
    system::{executor::Command, settings::Settings},
};
use anyhow::{Context, Result};

/// Main entry point for the 'run' command.
/// Expands `<shell> <flag> <template>` with the trailing arguments and supervises it.
pub async fn handle(args: RunArgs, settings: &Settings) -> Result<()> {
    let shell = args.shell.as_deref().unwrap_or(&settings.shell);
    let command = Command::script(shell, &settings.shell_flag, &args.template, &args.args)
        .with_context(|| format!("Invalid template '{}'", args.template))?;
    let command = commons::configure(command, &args.supervision, settings);
    commons::supervise(command, args.supervision.capture).await
}
