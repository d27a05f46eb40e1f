//! # System Interaction Layer
//!
//! Everything that touches the operating system: spawning and supervising processes,
//! resolving users, and reading the settings file.
//!
//! ## Modules
//!
//! - **`executor`**: the supervisor. Builds a safe argument vector from a template, binds
//!   the standard streams, starts the process in its own process group and waits for it
//!   while cancellation watchers stand by.
//! - **`process`**: the handle shared by the foreground wait, the watchers and the hooks.
//!   Owns the exactly-once cleanup.
//! - **`capture`**: in-memory sinks, including the head-and-tail bounded stderr capture.
//! - **`identity`**: user lookup for privilege drop and the elevation check.
//! - **`os`**: the few raw OS calls the above need.
//! - **`settings`**: loading of `config.toml`.

pub mod capture;
pub mod executor;
pub mod identity;
pub mod os;
pub mod process;
pub mod settings;
