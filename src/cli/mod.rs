// src/cli/mod.rs

//! Command-line definition of the `shellward` binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod handlers;

/// shellward: run commands built from untrusted input without shell injection.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Settings file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand a shell template with ARGS and run it under supervision.
    Run(RunArgs),
    /// Expand an argument-vector template element by element and run it.
    Exec(ExecArgs),
    /// Print the argument vector a template expands to, without running it.
    Expand(ExpandArgs),
    /// Print VALUE escaped as one literal shell word.
    Escape(EscapeArgs),
}

/// How the process is supervised. Shared by `run` and `exec`.
#[derive(Args, Debug, Clone, Default)]
pub struct SupervisionArgs {
    /// Kill the process group after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Working directory of the process.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Set an environment variable. May be repeated.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Start from an empty environment.
    #[arg(long)]
    pub clear_env: bool,

    /// Run the process as this user.
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,

    /// Prefix the command with the elevation command unless already root.
    #[arg(long)]
    pub sudo: bool,

    /// Capture output and print it once the process exits.
    #[arg(long, value_enum, value_name = "STREAMS")]
    pub capture: Option<CaptureMode>,
}

/// Which streams `--capture` collects.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Stdout only; a bounded copy of stderr is kept for the error report.
    Stdout,
    /// Stdout and stderr interleaved.
    Combined,
}

/// Arguments of `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Supervision flags.
    #[command(flatten)]
    pub supervision: SupervisionArgs,

    /// Interpreter to run the template with.
    #[arg(long, value_name = "SHELL")]
    pub shell: Option<String>,

    /// Shell template; every `%s` takes the next ARG.
    pub template: String,

    /// Values for the placeholders, in order.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments of `exec`.
#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Supervision flags.
    #[command(flatten)]
    pub supervision: SupervisionArgs,

    /// A placeholder value. May be repeated; consumed left to right.
    #[arg(long = "arg", value_name = "VALUE", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// The argument-vector template.
    #[arg(last = true, required = true, value_name = "ARGV")]
    pub argv: Vec<String>,
}

/// Arguments of `expand`.
#[derive(Args, Debug, Clone)]
pub struct ExpandArgs {
    /// Print the vector as a JSON array.
    #[arg(long)]
    pub json: bool,

    /// Interpreter to put in front of the template.
    #[arg(long, value_name = "SHELL")]
    pub shell: Option<String>,

    /// Shell template; every `%s` takes the next ARG.
    pub template: String,

    /// Values for the placeholders, in order.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments of `escape`.
#[derive(Args, Debug, Clone)]
pub struct EscapeArgs {
    /// Escape as if inside single quotes, where variables are not expanded.
    #[arg(long)]
    pub single_quoted: bool,

    /// The value to escape.
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("missing variable name in '{raw}'")),
        Some((key, value)) => Ok((key.to_owned(), value.to_owned())),
        None => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("A=b=c").unwrap(),
            ("A".to_owned(), "b=c".to_owned())
        );
        assert_eq!(parse_env_pair("EMPTY=").unwrap(), ("EMPTY".to_owned(), String::new()));
        assert!(parse_env_pair("novalue").is_err());
        assert!(parse_env_pair("=x").is_err());
    }

    #[test]
    fn test_run_collects_trailing_args() {
        let cli = Cli::parse_from(["shellward", "run", "--timeout", "3", "echo %s %s", "-n", "x y"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.supervision.timeout, Some(3));
        assert_eq!(args.template, "echo %s %s");
        assert_eq!(args.args, vec!["-n", "x y"]);
    }

    #[test]
    fn test_exec_takes_argv_after_double_dash() {
        let cli = Cli::parse_from([
            "shellward", "exec", "--arg", "a b", "--env", "K=V", "--", "ls", "-l", "%s",
        ]);
        let Commands::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.args, vec!["a b"]);
        assert_eq!(args.supervision.env, vec![("K".to_owned(), "V".to_owned())]);
        assert_eq!(args.argv, vec!["ls", "-l", "%s"]);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["shellward", "escape", "a b", "--config", "/tmp/x.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
