// src/constants.rs

//! Values shared by the templating engine, the supervisor and the CLI.

/// The two-character marker replaced by one escaped argument.
pub const PLACEHOLDER: &str = "%s";

/// The interpreter used by [`Command::sh`](crate::system::executor::Command::sh).
pub const DEFAULT_SHELL: &str = "sh";

/// The flag that makes the interpreter read its script from the next argument.
pub const SHELL_SCRIPT_FLAG: &str = "-c";

/// Budget, per end, of the stderr bytes kept for diagnostics by `capture_output`.
pub const STDERR_CAPTURE_BUDGET: usize = 32 << 10;

/// Command prefix used to elevate a non-root invocation.
pub const ELEVATION_PREFIX: &[&str] = &["sudo", "-E"];

/// Environment variable that overrides the location of the settings file.
pub const CONFIG_ENV_VAR: &str = "SHELLWARD_CONFIG";

/// Directory (inside the user's config dir) holding the settings file.
pub const CONFIG_DIR_NAME: &str = "shellward";

/// The name of the settings file.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Exit code used when the user interrupts a supervised command with Ctrl+C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
