// src/cli/handlers/commons.rs

//! Shared by the `run` and `exec` handlers.

use crate::{
    cli::{CaptureMode, SupervisionArgs},
    system::{
        executor::{Command, ExecutionError, Input, Redirect},
        settings::Settings,
    },
};
use anyhow::Result;
use std::ffi::OsString;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Failures that belong to the front-end rather than the supervisor.
#[derive(Error, Debug)]
pub enum CliError {
    /// Ctrl+C stopped the process.
    #[error("Interrupted by user.")]
    Interrupted,
}

/// Applies the supervision flags, falling back to `settings` where a flag is absent.
pub fn configure(mut command: Command, opts: &SupervisionArgs, settings: &Settings) -> Command {
    command = command
        .with_stdin(stdin_source(std::io::stdin().is_terminal()))
        .with_stderr_budget(settings.stderr_budget);

    if opts.clear_env || !opts.env.is_empty() {
        let mut env: Vec<(OsString, OsString)> = if opts.clear_env {
            Vec::new()
        } else {
            std::env::vars_os().collect()
        };
        for (key, value) in &opts.env {
            match env.iter_mut().find(|(k, _)| k.as_os_str() == key.as_str()) {
                Some((_, v)) => *v = value.into(),
                None => env.push((key.into(), value.into())),
            }
        }
        command = command.with_environment(env);
    }
    if let Some(dir) = &opts.dir {
        command = command.with_working_directory(dir);
    }
    if let Some(user) = &opts.user {
        command = command.with_privilege_drop(user);
    }
    if opts.sudo {
        command = command.with_elevation_prefix(&settings.elevation);
    }
    if let Some(limit) = opts.timeout.map(Duration::from_secs).or(settings.timeout()) {
        command = command.with_timeout(limit);
    }
    command
}

/// Where the child's stdin comes from.
///
/// The child runs in its own process group, outside the terminal's foreground group, so
/// reading from the terminal would stop it with `SIGTTIN`. A terminal stdin is therefore
/// replaced by the null device; piped or redirected stdin is passed through.
pub fn stdin_source(is_terminal: bool) -> Input {
    if is_terminal {
        log::debug!("Stdin is a terminal; the process reads from the null device.");
        Input::Null
    } else {
        Input::Inherit
    }
}

/// Runs `command` with Ctrl+C wired as a cancellation signal and prints any captured output.
pub async fn supervise(command: Command, capture: Option<CaptureMode>) -> Result<()> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    let command = command.with_cancellation(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => flag.store(true, Ordering::SeqCst),
            Err(e) => {
                log::warn!("Could not listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });
    log::debug!("Supervising {:?}", command.argv());

    let result = match capture {
        None => command
            .with_stdout(Redirect::Inherit)
            .with_stderr(Redirect::Inherit)
            .run()
            .await
            .map(|()| Vec::new()),
        Some(CaptureMode::Stdout) => command.capture_output().await,
        Some(CaptureMode::Combined) => command.capture_combined_output().await,
    };

    match result {
        Ok(output) => {
            std::io::stdout().write_all(&output)?;
            Ok(())
        }
        Err(_) if interrupted.load(Ordering::SeqCst) => Err(CliError::Interrupted.into()),
        Err(ExecutionError::Exit(exit)) => {
            std::io::stdout().write_all(&exit.stdout)?;
            std::io::stderr().write_all(&exit.stderr)?;
            Err(ExecutionError::Exit(exit).into())
        }
        Err(e) => Err(e.into()),
    }
}
