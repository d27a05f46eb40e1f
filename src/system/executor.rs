// src/system/executor.rs

//! The process lifecycle supervisor.
//!
//! A [`Command`] is built from an argument-vector template and its untrusted arguments,
//! configured through a chain of `with_*` calls, and consumed by exactly one terminal
//! operation: [`Command::run`], [`Command::capture_output`] or
//! [`Command::capture_combined_output`].
//!
//! Configuration never fails mid-chain. Problems such as an unknown user are recorded on
//! the command and returned by the terminal operation before anything is started.

use crate::{
    constants::{DEFAULT_SHELL, SHELL_SCRIPT_FLAG, STDERR_CAPTURE_BUDGET},
    core::template::{TemplateError, expand, expand_argv},
    models::ProcessState,
    system::{
        capture::{BoundedCapture, SharedSink},
        identity::{self, IdentityError, User},
        process::{Hook, Process, kill_group},
    },
};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Everything a [`Command`] can fail with, from construction to exit.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The template could not be expanded with the given arguments.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The argument vector is empty or starts with an empty program.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// Resolving the privilege-drop user failed.
    #[error("Failed to look up user '{user}': {source}")]
    UserLookup {
        /// The requested name.
        user: String,
        /// The OS error.
        #[source]
        source: io::Error,
    },
    /// The privilege-drop user does not exist.
    #[error("User '{0}' does not exist.")]
    UnknownUser(String),
    /// A configured feature has no implementation on this platform.
    #[error("{0} is not supported on this platform.")]
    Unsupported(&'static str),
    /// Stdout was bound by the caller and also requested for capture.
    #[error("Stdout already set")]
    StdoutAlreadySet,
    /// Stderr was bound by the caller and combined capture was requested.
    #[error("Stderr already set")]
    StderrAlreadySet,
    /// The OS refused to start the program.
    #[error("Command '{program}' could not be executed: {source}")]
    Spawn {
        /// The program that was started.
        program: String,
        /// Why it could not be.
        #[source]
        source: io::Error,
    },
    /// Wiring streams or waiting on the process failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The process exited unsuccessfully on its own.
    #[error(transparent)]
    Exit(#[from] ExitError),
    /// The process was killed after a cancellation signal or timeout.
    #[error("signal: killed")]
    Killed,
    /// A signal fired before anything was started.
    #[error("Operation was cancelled before the process started.")]
    Cancelled,
}

impl From<IdentityError> for ExecutionError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::UnknownUser(user) => Self::UnknownUser(user),
            IdentityError::Lookup { user, source } => Self::UserLookup { user, source },
            IdentityError::Unsupported => Self::Unsupported("Privilege drop"),
        }
    }
}

/// A process that ran to completion with a non-zero status.
///
/// `stdout` and `stderr` hold whatever the terminal operation captured; both are empty
/// for [`Command::run`].
#[derive(Error, Debug, Clone)]
#[error("{}", describe_status(.status))]
pub struct ExitError {
    /// The raw wait status.
    pub status: ExitStatus,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr, bounded by the stderr budget.
    pub stderr: Vec<u8>,
}

impl ExitError {
    /// The exit code, or `None` if the process died from a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

fn describe_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status: {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal: {signal}");
        }
    }
    "exit status: unknown".to_owned()
}

/// Where standard input comes from.
pub enum Input {
    /// The parent's stdin.
    Inherit,
    /// The null device.
    Null,
    /// An open file.
    File(File),
    /// Written to the process through a pipe, then closed.
    Bytes(Vec<u8>),
}

/// Where an output stream goes.
pub enum Redirect {
    /// The parent's stream.
    Inherit,
    /// The null device.
    Null,
    /// An open file.
    File(File),
    /// Copied into the writer on a blocking thread until the process closes the stream.
    Writer(Box<dyn Write + Send>),
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => f.write_str("Inherit"),
            Self::Null => f.write_str("Null"),
            Self::File(file) => f.debug_tuple("File").field(file).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => f.write_str("Inherit"),
            Self::Null => f.write_str("Null"),
            Self::File(file) => f.debug_tuple("File").field(file).finish(),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

type Signal = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Nothing,
    Stdout,
    Combined,
}

/// A supervised external command.
pub struct Command {
    argv: Vec<String>,
    env: Option<Vec<(OsString, OsString)>>,
    dir: Option<PathBuf>,
    stdin: Input,
    stdout: Option<Redirect>,
    stderr: Option<Redirect>,
    user: Option<User>,
    elevation: Option<Vec<String>>,
    stderr_budget: usize,
    on_start: Vec<Hook>,
    cancellations: Vec<Signal>,
    last_error: Option<ExecutionError>,
    process: Arc<Process>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("argv", &self.argv())
            .field("dir", &self.dir)
            .field("stdin", &self.stdin)
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .field("user", &self.user.as_ref().map(|u| &u.name))
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl Command {
    /// Expands every element of `argv_template` with `args`.
    ///
    /// ```
    /// use shellward::system::executor::Command;
    ///
    /// let cmd = Command::new(&["sh", "-c", "touch %s"], &["a b;rm -rf /"]).unwrap();
    /// assert_eq!(cmd.argv(), vec!["sh", "-c", r"touch a\ b\;rm\ -rf\ /"]);
    /// ```
    pub fn new<T, S>(argv_template: &[T], args: &[S]) -> Result<Self, ExecutionError>
    where
        T: AsRef<str>,
        S: AsRef<str>,
    {
        let argv = expand_argv(argv_template, args)?;
        Self::from_argv(argv)
    }

    /// Runs `template` with `sh -c`.
    pub fn sh<S: AsRef<str>>(template: &str, args: &[S]) -> Result<Self, ExecutionError> {
        Self::shell(DEFAULT_SHELL, template, args)
    }

    /// Runs `template` with `<shell> -c`. The shell name itself is not a template.
    pub fn shell<S: AsRef<str>>(
        shell: &str,
        template: &str,
        args: &[S],
    ) -> Result<Self, ExecutionError> {
        Self::script(shell, SHELL_SCRIPT_FLAG, template, args)
    }

    /// Runs `template` with `<interpreter> <flag>`, for interpreters that do not use `-c`.
    pub fn script<S: AsRef<str>>(
        interpreter: &str,
        flag: &str,
        template: &str,
        args: &[S],
    ) -> Result<Self, ExecutionError> {
        let script = expand(template, args)?;
        Self::from_argv(vec![interpreter.to_owned(), flag.to_owned(), script])
    }

    fn from_argv(argv: Vec<String>) -> Result<Self, ExecutionError> {
        if argv.first().is_none_or(|program| program.is_empty()) {
            return Err(ExecutionError::EmptyCommand);
        }
        Ok(Self {
            argv,
            env: None,
            dir: None,
            stdin: Input::Null,
            stdout: None,
            stderr: None,
            user: None,
            elevation: None,
            stderr_budget: STDERR_CAPTURE_BUDGET,
            on_start: Vec::new(),
            cancellations: Vec::new(),
            last_error: None,
            process: Process::new(),
        })
    }

    // --- Configuration ---

    /// Replaces the whole environment of the process.
    ///
    /// A privilege drop still sets `HOME` on top of it, whichever call comes first.
    pub fn with_environment<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Starts the process in `dir`.
    pub fn with_working_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dunce::simplified(dir.as_ref()).to_path_buf());
        self
    }

    /// Where stdin comes from. Defaults to the null device.
    pub fn with_stdin(mut self, input: Input) -> Self {
        self.stdin = input;
        self
    }

    /// Binds stdout. Capturing operations reject a bound stdout.
    pub fn with_stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = Some(redirect);
        self
    }

    /// Binds stderr.
    pub fn with_stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = Some(redirect);
        self
    }

    /// Swaps the interpreter of a `<shell> -c <script>` command, e.g. `bash` for `sh`.
    pub fn with_shell_program(mut self, program: impl Into<String>) -> Self {
        if let Some(first) = self.argv.first_mut() {
            *first = program.into();
        }
        self
    }

    /// Runs the process as `user`: that user's uid, gid and `HOME`.
    ///
    /// Resolution failures are recorded and returned by the terminal operation.
    pub fn with_privilege_drop(mut self, user: &str) -> Self {
        match identity::lookup_user(user) {
            Ok(user) => self.user = Some(user),
            Err(err) => self.record_error(err.into()),
        }
        self
    }

    /// Prefixes the command with `sudo -E` unless already running as root.
    pub fn with_elevation(mut self) -> Self {
        self.elevation = identity::elevation_prefix();
        self
    }

    /// Like [`Command::with_elevation`] with a different elevation command.
    pub fn with_elevation_prefix<S: AsRef<str>>(mut self, prefix: &[S]) -> Self {
        self.elevation = identity::elevation_prefix_with(prefix);
        self
    }

    /// How many head and tail bytes of stderr to keep for error reports.
    pub fn with_stderr_budget(mut self, bytes: usize) -> Self {
        self.stderr_budget = bytes;
        self
    }

    /// Runs `hook` right after the process has started.
    pub fn on_start(mut self, hook: impl FnOnce(&Process) + Send + 'static) -> Self {
        self.on_start.push(Box::new(hook));
        self
    }

    /// Runs `hook` exactly once when the process is done, whether it exited or was killed.
    pub fn on_exit(self, hook: impl FnOnce(&Process) + Send + 'static) -> Self {
        self.process.push_exit_hook(Box::new(hook));
        self
    }

    /// Kills the process group when `signal` completes before the process does.
    ///
    /// Every call adds one more independent watcher.
    pub fn with_cancellation(mut self, signal: impl Future<Output = ()> + Send + 'static) -> Self {
        self.cancellations.push(Box::pin(signal));
        self
    }

    /// Kills the process group once `limit` has elapsed.
    ///
    /// The clock starts with the terminal operation.
    pub fn with_timeout(self, limit: Duration) -> Self {
        let (release, released) = oneshot::channel::<()>();
        self.process.push_exit_hook(Box::new(move |_: &Process| {
            let _ = release.send(());
        }));
        self.with_cancellation(async move {
            if tokio::time::timeout(limit, released).await.is_err() {
                log::debug!("Timeout of {:?} elapsed.", limit);
                return;
            }
            std::future::pending::<()>().await;
        })
    }

    fn record_error(&mut self, err: ExecutionError) {
        if self.last_error.is_none() {
            self.last_error = Some(err);
        }
    }

    // --- Queries ---

    /// The argument vector that will be started, elevation prefix included.
    pub fn argv(&self) -> Vec<String> {
        self.elevation
            .iter()
            .flatten()
            .chain(self.argv.iter())
            .cloned()
            .collect()
    }

    /// The shared handle hooks receive. Stays valid after the terminal operation.
    pub fn process(&self) -> Arc<Process> {
        Arc::clone(&self.process)
    }

    // --- Terminal operations ---

    /// Starts the process and waits for it.
    pub async fn run(self) -> Result<(), ExecutionError> {
        self.execute(Capture::Nothing).await.map(|_| ())
    }

    /// Runs the process and returns its stdout.
    ///
    /// Unless stderr was bound by the caller, a bounded copy of it is attached to the
    /// [`ExitError`] on failure.
    pub async fn capture_output(self) -> Result<Vec<u8>, ExecutionError> {
        self.execute(Capture::Stdout).await
    }

    /// Runs the process and returns stdout and stderr interleaved in one buffer.
    pub async fn capture_combined_output(self) -> Result<Vec<u8>, ExecutionError> {
        self.execute(Capture::Combined).await
    }

    async fn execute(mut self, capture: Capture) -> Result<Vec<u8>, ExecutionError> {
        let process = Arc::clone(&self.process);
        let _cleanup = scopeguard::guard(Arc::clone(&process), |process| {
            // The caller dropped us while the process was still running.
            if process.pid().is_some() && !process.state().is_terminal() {
                process.cancel();
            }
            process.cleanup();
        });

        if let Err(err) = self.preflight(capture) {
            process.mark_start_failed();
            return Err(err);
        }

        for signal in self.cancellations.drain(..) {
            process.watch(signal);
        }
        if process.is_cancelled() {
            process.mark_start_failed();
            return Err(ExecutionError::Cancelled);
        }

        let argv = self.argv();
        process.set_argv(argv.clone());
        let Some((program, args)) = argv.split_first() else {
            process.mark_start_failed();
            return Err(ExecutionError::EmptyCommand);
        };

        let mut command = self.os_command(program, args);
        let mut copiers = Vec::new();
        let mut stdout_sink = None;
        let mut stderr_sink = None;
        let wired = self.wire_streams(
            capture,
            &mut command,
            &mut copiers,
            &mut stdout_sink,
            &mut stderr_sink,
        );
        if let Err(err) = wired {
            process.mark_start_failed();
            return Err(err.into());
        }
        let stdin_bytes = match std::mem::replace(&mut self.stdin, Input::Null) {
            Input::Bytes(bytes) => Some(bytes),
            _ => None,
        };

        let spawned = command.spawn();
        // Closes our copies of the pipe write ends so the copiers see EOF.
        drop(command);
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                process.mark_start_failed();
                return Err(ExecutionError::Spawn {
                    program: program.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        process.mark_running(pid);
        log::debug!("Started '{}' (pid {:?}).", program, pid);

        if let (Some(bytes), Some(mut stdin)) = (stdin_bytes, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&bytes).await {
                    log::debug!("Stopped writing stdin: {}", e);
                }
            });
        }

        for hook in self.on_start.drain(..) {
            hook(&process);
        }

        let mut cancelled = process.subscribe_cancelled();
        let outcome = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancelled.wait_for(|fired| *fired) => None,
        };
        let status = match outcome {
            Some(status) => status,
            None => {
                log::debug!("Killing process group of '{}' (pid {:?}).", program, pid);
                if let Some(pid) = pid {
                    kill_group(pid);
                }
                let _ = child.start_kill();
                child.wait().await
            }
        };
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                process.mark_finished(ProcessState::Killed);
                return Err(e.into());
            }
        };
        let copied = join_copiers(copiers).await;

        if status.success() {
            process.mark_finished(ProcessState::Exited(0));
            copied?;
            return Ok(stdout_sink.map(|sink| sink.take()).unwrap_or_default());
        }
        if process.is_cancelled() {
            process.mark_finished(ProcessState::Killed);
            return Err(ExecutionError::Killed);
        }
        process.mark_finished(match status.code() {
            Some(code) => ProcessState::Exited(code),
            None => ProcessState::Killed,
        });
        if let Err(e) = copied {
            log::warn!("Lost part of the output of '{}': {}", program, e);
        }
        Err(ExitError {
            status,
            stdout: stdout_sink.map(|sink| sink.take()).unwrap_or_default(),
            stderr: stderr_sink
                .map(|sink| sink.with(|capture| capture.bytes()))
                .unwrap_or_default(),
        }
        .into())
    }

    /// The OS command before its streams are bound.
    fn os_command(&self, program: &str, args: &[String]) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(program);
        command.args(args).kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(env) = &self.env {
            command.env_clear().envs(env.iter().map(|(k, v)| (k, v)));
        }
        if let Some(user) = &self.user {
            command.env("HOME", &user.home);
            #[cfg(unix)]
            command.gid(user.gid).uid(user.uid);
        }
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command
    }

    /// Checks everything that must fail before a process is started.
    fn preflight(&mut self, capture: Capture) -> Result<(), ExecutionError> {
        if let Some(err) = self.last_error.take() {
            return Err(err);
        }
        match capture {
            Capture::Stdout | Capture::Combined if self.stdout.is_some() => {
                Err(ExecutionError::StdoutAlreadySet)
            }
            Capture::Combined if self.stderr.is_some() => Err(ExecutionError::StderrAlreadySet),
            _ => Ok(()),
        }
    }

    /// Binds the three standard streams on `command`.
    fn wire_streams(
        &mut self,
        capture: Capture,
        command: &mut tokio::process::Command,
        copiers: &mut Vec<JoinHandle<io::Result<()>>>,
        stdout_sink: &mut Option<SharedSink<Vec<u8>>>,
        stderr_sink: &mut Option<SharedSink<BoundedCapture>>,
    ) -> io::Result<()> {
        let stdin = match std::mem::replace(&mut self.stdin, Input::Null) {
            Input::Inherit => Stdio::inherit(),
            Input::Null => Stdio::null(),
            Input::File(file) => Stdio::from(file),
            Input::Bytes(bytes) => {
                self.stdin = Input::Bytes(bytes);
                Stdio::piped()
            }
        };
        command.stdin(stdin);

        match capture {
            Capture::Nothing => {
                command.stdout(redirect_stdio(self.stdout.take(), copiers)?);
                command.stderr(redirect_stdio(self.stderr.take(), copiers)?);
            }
            Capture::Stdout => {
                let sink = SharedSink::new(Vec::new());
                command.stdout(copy_into(sink.clone(), copiers)?);
                *stdout_sink = Some(sink);
                match self.stderr.take() {
                    Some(redirect) => {
                        command.stderr(redirect_stdio(Some(redirect), copiers)?);
                    }
                    None => {
                        let sink = SharedSink::new(BoundedCapture::new(self.stderr_budget));
                        command.stderr(copy_into(sink.clone(), copiers)?);
                        *stderr_sink = Some(sink);
                    }
                }
            }
            Capture::Combined => {
                // One pipe for both streams keeps the bytes in write order.
                let sink = SharedSink::new(Vec::new());
                let (reader, writer) = io::pipe()?;
                command.stderr(writer.try_clone()?);
                command.stdout(writer);
                copiers.push(spawn_copier(reader, sink.clone()));
                *stdout_sink = Some(sink);
            }
        }
        Ok(())
    }
}

fn redirect_stdio(
    redirect: Option<Redirect>,
    copiers: &mut Vec<JoinHandle<io::Result<()>>>,
) -> io::Result<Stdio> {
    Ok(match redirect {
        None | Some(Redirect::Null) => Stdio::null(),
        Some(Redirect::Inherit) => Stdio::inherit(),
        Some(Redirect::File(file)) => Stdio::from(file),
        Some(Redirect::Writer(writer)) => copy_into(writer, copiers)?,
    })
}

/// A pipe whose read end is drained into `sink` on a blocking thread.
fn copy_into<W>(sink: W, copiers: &mut Vec<JoinHandle<io::Result<()>>>) -> io::Result<Stdio>
where
    W: Write + Send + 'static,
{
    let (reader, writer) = io::pipe()?;
    copiers.push(spawn_copier(reader, sink));
    Ok(Stdio::from(writer))
}

fn spawn_copier<W>(mut reader: io::PipeReader, mut sink: W) -> JoinHandle<io::Result<()>>
where
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        io::copy(&mut reader, &mut sink)?;
        sink.flush()
    })
}

/// Waits for every copier and returns the first failure.
async fn join_copiers(copiers: Vec<JoinHandle<io::Result<()>>>) -> io::Result<()> {
    let mut first_error = None;
    for copier in copiers {
        let result = match copier.await {
            Ok(result) => result,
            Err(join_error) => Err(io::Error::other(join_error)),
        };
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ELEVATION_PREFIX;
    use crate::system::os;

    #[test]
    fn test_new_expands_each_element() {
        let cmd = Command::new(&["sh", "-c", "touch %s"], &["a b;rm -rf /"]).unwrap();
        assert_eq!(cmd.argv(), vec!["sh", "-c", r"touch a\ b\;rm\ -rf\ /"]);
    }

    #[test]
    fn test_sh_builds_a_dash_c_invocation() {
        let cmd = Command::sh("echo %s", &["$(id)"]).unwrap();
        assert_eq!(cmd.argv(), vec!["sh", "-c", r"echo \$\(id\)"]);
    }

    #[test]
    fn test_template_errors_surface_from_the_constructor() {
        let err = Command::sh("echo %s %s", &["one"]).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Template(TemplateError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_empty_argv_is_rejected() {
        let err = Command::new(&[] as &[&str], &[] as &[&str]).unwrap_err();
        assert!(matches!(err, ExecutionError::EmptyCommand));
    }

    #[test]
    fn test_shell_program_override_replaces_the_interpreter_only() {
        let cmd = Command::sh("printf %s", &["x"])
            .unwrap()
            .with_shell_program("bash");
        assert_eq!(cmd.argv(), vec!["bash", "-c", "printf x"]);
    }

    #[test]
    fn test_elevation_prefix_is_prepended_when_unprivileged() {
        let cmd = Command::sh("id", &[] as &[&str]).unwrap().with_elevation();
        let argv = cmd.argv();
        if os::is_privileged() {
            assert_eq!(argv, vec!["sh", "-c", "id"]);
        } else {
            assert_eq!(argv.get(..ELEVATION_PREFIX.len()).unwrap(), ELEVATION_PREFIX);
            assert_eq!(argv.last().map(String::as_str), Some("id"));
        }
    }

    #[test]
    fn test_exit_error_display() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let err = ExitError {
                status: ExitStatus::from_raw(1 << 8),
                stdout: Vec::new(),
                stderr: Vec::new(),
            };
            assert_eq!(err.to_string(), "exit status: 1");
            assert_eq!(err.code(), Some(1));

            let err = ExitError {
                status: ExitStatus::from_raw(9),
                stdout: Vec::new(),
                stderr: Vec::new(),
            };
            assert_eq!(err.to_string(), "signal: 9");
            assert_eq!(err.code(), None);
        }
    }

    /// The variables set explicitly on the OS command for `cmd`.
    fn explicit_env(cmd: &Command) -> Vec<(OsString, Option<OsString>)> {
        let argv = cmd.argv();
        let (program, args) = argv.split_first().unwrap();
        cmd.os_command(program, args)
            .as_std()
            .get_envs()
            .map(|(k, v)| (k.to_owned(), v.map(ToOwned::to_owned)))
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_privilege_drop_home_survives_a_later_environment() {
        // --- Setup ---
        let root = identity::lookup_user("root").unwrap();

        // --- Execution ---
        let cmd = Command::sh("true", &[] as &[&str])
            .unwrap()
            .with_privilege_drop("root")
            .with_environment([("PATH", "/bin"), ("HOME", "/elsewhere")]);

        // --- Assertions ---
        let env = explicit_env(&cmd);
        let home = env.iter().rev().find(|(k, _)| k == "HOME").unwrap();
        assert_eq!(home.1.as_deref(), Some(root.home.as_os_str()));
        assert!(env.iter().any(|(k, v)| k == "PATH" && v.as_deref() == Some("/bin".as_ref())));
    }

    #[cfg(unix)]
    #[test]
    fn test_privilege_drop_without_environment_only_sets_home() {
        let cmd = Command::sh("true", &[] as &[&str])
            .unwrap()
            .with_privilege_drop("root");

        let env = explicit_env(&cmd);
        let keys: Vec<_> = env.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![OsString::from("HOME")]);
    }

    #[test]
    fn test_environment_accepts_non_utf8_values() {
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStringExt;
            let value = OsString::from_vec(vec![0xff, 0xfe]);
            let cmd = Command::sh("true", &[] as &[&str])
                .unwrap()
                .with_environment([(OsString::from("RAW"), value.clone())]);

            let env = explicit_env(&cmd);
            assert!(env.iter().any(|(k, v)| k == "RAW" && v.as_ref() == Some(&value)));
        }
    }

    #[tokio::test]
    async fn test_unknown_user_is_reported_by_the_terminal_operation() {
        // --- Setup ---
        let cmd = Command::sh("true", &[] as &[&str])
            .unwrap()
            .with_privilege_drop("shellward-no-such-user")
            .with_working_directory("/");
        let process = cmd.process();

        // --- Execution ---
        let err = cmd.run().await.unwrap_err();

        // --- Assertions ---
        if cfg!(unix) {
            assert!(matches!(err, ExecutionError::UnknownUser(ref u) if u == "shellward-no-such-user"));
        } else {
            assert!(matches!(err, ExecutionError::Unsupported(_)));
        }
        assert_eq!(process.state(), ProcessState::StartFailed);
        assert_eq!(process.pid(), None);
    }

    #[tokio::test]
    async fn test_first_configuration_error_wins() {
        let err = Command::sh("true", &[] as &[&str])
            .unwrap()
            .with_privilege_drop("shellward-first-missing")
            .with_privilege_drop("shellward-second-missing")
            .run()
            .await
            .unwrap_err();
        if cfg!(unix) {
            assert!(matches!(err, ExecutionError::UnknownUser(ref u) if u == "shellward-first-missing"));
        }
    }

    #[tokio::test]
    async fn test_double_bound_stdout_fails_before_start() {
        let cmd = Command::sh("true", &[] as &[&str])
            .unwrap()
            .with_stdout(Redirect::Null);
        let process = cmd.process();

        let err = cmd.capture_output().await.unwrap_err();

        assert!(matches!(err, ExecutionError::StdoutAlreadySet));
        assert_eq!(process.pid(), None);
    }

    #[tokio::test]
    async fn test_exit_hooks_run_even_when_preflight_fails() {
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let err = Command::sh("true", &[] as &[&str])
            .unwrap()
            .with_stderr(Redirect::Inherit)
            .on_exit(move |_| flag.store(true, std::sync::atomic::Ordering::SeqCst))
            .capture_combined_output()
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::StderrAlreadySet));
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_signal_that_already_fired_cancels() {
        let cmd = Command::sh("sleep 5", &[] as &[&str])
            .unwrap()
            .with_cancellation(async {});
        let process = cmd.process();

        let result = cmd.run().await;

        // The watcher may win before the spawn or only after it.
        assert!(matches!(
            result,
            Err(ExecutionError::Cancelled) | Err(ExecutionError::Killed)
        ));
        assert!(process.is_cancelled());
    }
}
