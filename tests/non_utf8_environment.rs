//! Runs with a parent environment that is not valid UTF-8.
//!
//! Kept in its own test binary: it mutates the process environment, which is only sound
//! while no other test thread is running.
#![cfg(unix)]

use shellward::cli::SupervisionArgs;
use shellward::cli::handlers::commons::configure;
use shellward::system::executor::Command;
use shellward::system::{os, settings::Settings};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

const NO_ARGS: &[&str] = &[];

#[allow(unsafe_code)]
#[tokio::test(flavor = "current_thread")]
async fn test_non_utf8_parent_environment_is_carried_through() {
    // --- Setup ---
    // SAFETY: the only test in this binary, set before any thread is spawned.
    unsafe {
        std::env::set_var("SHELLWARD_RAW", OsStr::from_bytes(b"\xff\xfe"));
    }

    // --- Execution ---
    let dropped = Command::sh("printenv SHELLWARD_RAW", NO_ARGS)
        .unwrap()
        .with_privilege_drop("root");
    let opts = SupervisionArgs {
        env: vec![("SHELLWARD_EXTRA".to_owned(), "1".to_owned())],
        ..SupervisionArgs::default()
    };
    let configured = configure(
        Command::sh("printenv SHELLWARD_RAW", NO_ARGS).unwrap(),
        &opts,
        &Settings::default(),
    );

    // --- Assertions ---
    assert_eq!(configured.capture_output().await.unwrap(), b"\xff\xfe\n");
    if os::is_privileged() {
        assert_eq!(dropped.capture_output().await.unwrap(), b"\xff\xfe\n");
    } else {
        // Switching to root needs privileges, so only the spawn may fail.
        assert!(dropped.capture_output().await.is_err());
    }
}
