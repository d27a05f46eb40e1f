//! # shellward
//!
//! Builds external-process invocations from untrusted string fragments without
//! opening the door to shell injection, then supervises the spawned process.
//!
//! The crate is split the same way data flows through it:
//!
//! - **`core`**: the templating engine. A quote-aware tokenizer, a context-sensitive
//!   escaper and the `%s` placeholder expander that together produce a safe argument vector.
//! - **`system`**: the process lifecycle supervisor. It runs that vector, links
//!   cancellation signals and timeouts to it, tears down the whole process group when
//!   cancelled and runs lifecycle hooks exactly once.
//! - **`cli`**: the `shellward` command-line front-end.
//!
//! ```no_run
//! use shellward::system::executor::Command;
//!
//! # async fn demo() -> Result<(), shellward::system::executor::ExecutionError> {
//! let user_input = ";rm -rf /";
//! let out = Command::sh("echo %s", &[user_input])?.capture_output().await?;
//! assert_eq!(out, b";rm -rf /\n");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
