// src/cli/handlers/expand.rs

//! `shellward expand`.

use crate::{
    cli::ExpandArgs,
    core::template,
    system::settings::Settings,
};
use anyhow::{Context, Result};

/// Main entry point for the 'expand' command. Nothing is executed.
pub fn handle(args: ExpandArgs, settings: &Settings) -> Result<()> {
    let argv = render(&args, settings)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&argv)?);
    } else {
        for element in &argv {
            println!("{element}");
        }
    }
    Ok(())
}

/// The argument vector `run` would start for the same template and arguments.
pub fn render(args: &ExpandArgs, settings: &Settings) -> Result<Vec<String>> {
    let script = template::expand(&args.template, &args.args)
        .with_context(|| format!("Invalid template '{}'", args.template))?;
    let shell = args.shell.clone().unwrap_or_else(|| settings.shell.clone());
    Ok(vec![shell, settings.shell_flag.clone(), script])
}
