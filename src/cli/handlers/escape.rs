// src/cli/handlers/escape.rs

//! `shellward escape`.

use crate::{cli::EscapeArgs, core::escaper};
use anyhow::Result;

/// Main entry point for the 'escape' command.
pub fn handle(args: EscapeArgs) -> Result<()> {
    println!("{}", escaper::escape(&args.value, !args.single_quoted));
    Ok(())
}
