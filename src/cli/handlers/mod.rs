// src/cli/handlers/mod.rs

//! One module per subcommand.

pub mod commons;
pub mod escape;
pub mod exec;
pub mod expand;
pub mod run;
