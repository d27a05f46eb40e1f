// src/models.rs

//! Data types shared between the templating engine and the supervisor.

use serde::Serialize;
use std::fmt;

// --- TEMPLATE MODELS ---

/// The quoting context a piece of template text lives in.
///
/// The mode decides the escaping policy for any placeholder inside the token:
/// variable references survive in `Bare` and `DoubleQuoted` text, never in `SingleQuoted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QuoteMode {
    /// Unquoted text, including whitespace and backslash escapes.
    Bare,
    /// Text that was written between `"` delimiters.
    DoubleQuoted,
    /// Text that was written between `'` delimiters.
    SingleQuoted,
}

impl QuoteMode {
    /// Whether `$NAME` / `${NAME}` references are left unescaped in this context.
    pub fn preserves_variables(self) -> bool {
        self != Self::SingleQuoted
    }

    /// The delimiter that opens and closes this mode, if any.
    pub fn delimiter(self) -> Option<char> {
        match self {
            Self::Bare => None,
            Self::DoubleQuoted => Some('"'),
            Self::SingleQuoted => Some('\''),
        }
    }
}

impl fmt::Display for QuoteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare => f.write_str("bare"),
            Self::DoubleQuoted => f.write_str("double"),
            Self::SingleQuoted => f.write_str("single"),
        }
    }
}

/// A contiguous run of template text with the quoting mode it was written in.
///
/// `text` borrows from the template and never includes the quote delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// How the shell will read `text`.
    pub mode: QuoteMode,
    /// The run itself, without delimiters.
    pub text: &'a str,
}

impl<'a> Token<'a> {
    /// A token of `text` read in `mode`.
    pub fn new(mode: QuoteMode, text: &'a str) -> Self {
        Self { mode, text }
    }
}

// --- PROCESS MODELS ---

/// Lifecycle of one supervised process.
///
/// `Pending -> Running -> {Exited | Killed}` or `Pending -> StartFailed`.
/// The last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ProcessState {
    /// Configured but not started.
    #[default]
    Pending,
    /// Started and not yet reaped.
    Running,
    /// The process exited on its own with this code.
    Exited(i32),
    /// The process was terminated by a signal.
    Killed,
    /// Never started, either rejected before spawning or failed to spawn.
    StartFailed,
}

impl ProcessState {
    /// Whether the state can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exited(_) | Self::Killed | Self::StartFailed)
    }
}
