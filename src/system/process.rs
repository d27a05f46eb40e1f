// src/system/process.rs

//! The handle shared between a terminal operation and its cancellation watchers.
//!
//! A [`Process`] owns everything that more than one task may touch: the pid, the
//! lifecycle state, the exit-hook list and the two signals (`cancelled`, `finished`)
//! that watchers and the foreground wait select on.

use crate::models::ProcessState;
use crate::system::os;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// A lifecycle callback. Exit hooks run exactly once, in registration order.
pub type Hook = Box<dyn FnOnce(&Process) + Send + 'static>;

struct Inner {
    pid: Option<u32>,
    argv: Vec<String>,
    state: ProcessState,
    on_exit: Vec<Hook>,
    cleaned_up: bool,
}

/// Shared handle to one supervised process.
///
/// Hooks, watchers and the caller all hold the same `Arc<Process>`; it stays readable
/// after the process is gone.
pub struct Process {
    inner: Mutex<Inner>,
    // Held while exit hooks run so a second caller of `cleanup` returns only after
    // the first one has finished them.
    cleanup_gate: Mutex<()>,
    cancelled: watch::Sender<bool>,
    finished: watch::Sender<bool>,
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Process")
            .field("pid", &inner.pid)
            .field("argv", &inner.argv)
            .field("state", &inner.state)
            .field("exit_hooks", &inner.on_exit.len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Process {
    /// Creates a pending handle with the process-group kill already installed as the
    /// first exit hook.
    pub(crate) fn new() -> Arc<Self> {
        let process = Arc::new(Self {
            inner: Mutex::new(Inner {
                pid: None,
                argv: Vec::new(),
                state: ProcessState::Pending,
                on_exit: Vec::new(),
                cleaned_up: false,
            }),
            cleanup_gate: Mutex::new(()),
            cancelled: watch::Sender::new(false),
            finished: watch::Sender::new(false),
        });
        process.push_exit_hook(Box::new(|process: &Process| {
            if process.is_cancelled() {
                if let Some(pid) = process.pid() {
                    kill_group(pid);
                }
            }
        }));
        process
    }

    /// The OS pid, once the process has been started.
    pub fn pid(&self) -> Option<u32> {
        self.lock().pid
    }

    /// Where the process is in its lifecycle.
    pub fn state(&self) -> ProcessState {
        self.lock().state
    }

    /// The final argument vector the process was (or will be) started with.
    pub fn argv(&self) -> Vec<String> {
        self.lock().argv.clone()
    }

    /// Whether a cancellation signal or timeout has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    pub(crate) fn cancel(&self) {
        if !self.cancelled.send_replace(true) {
            log::debug!("Cancellation requested for process {:?}.", self.pid());
        }
    }

    pub(crate) fn subscribe_cancelled(&self) -> watch::Receiver<bool> {
        self.cancelled.subscribe()
    }

    pub(crate) fn set_argv(&self, argv: Vec<String>) {
        self.lock().argv = argv;
    }

    pub(crate) fn mark_running(&self, pid: Option<u32>) {
        let mut inner = self.lock();
        if inner.state == ProcessState::Pending {
            inner.pid = pid;
            inner.state = ProcessState::Running;
        }
    }

    pub(crate) fn mark_finished(&self, state: ProcessState) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = state;
        }
    }

    pub(crate) fn mark_start_failed(&self) {
        self.mark_finished(ProcessState::StartFailed);
    }

    /// Appends an exit hook. After cleanup has happened the hook runs right away.
    pub(crate) fn push_exit_hook(&self, hook: Hook) {
        let mut inner = self.lock();
        if inner.cleaned_up {
            drop(inner);
            hook(self);
            return;
        }
        inner.on_exit.push(hook);
    }

    /// Spawns a watcher that cancels and cleans up when `signal` completes first,
    /// and exits quietly when the process finishes first.
    pub(crate) fn watch<F>(self: &Arc<Self>, signal: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let process = Arc::clone(self);
        let mut finished = self.finished.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = finished.wait_for(|done| *done) => {}
                () = signal => {
                    log::debug!("Cancellation signal fired for process {:?}.", process.pid());
                    process.cancel();
                    process.cleanup();
                }
            }
        });
    }

    /// Runs the exit hooks exactly once and releases every watcher.
    ///
    /// Safe to call from several tasks at once. Every caller returns only after the
    /// hooks have run.
    pub(crate) fn cleanup(&self) {
        let _gate = self
            .cleanup_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let hooks = {
            let mut inner = self.lock();
            if inner.cleaned_up {
                return;
            }
            inner.cleaned_up = true;
            std::mem::take(&mut inner.on_exit)
        };
        log::trace!("Running {} exit hook(s) for process {:?}.", hooks.len(), self.pid());
        for hook in hooks {
            hook(self);
        }
        self.finished.send_replace(true);
        log::debug!("Process {:?} cleaned up.", self.pid());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Best-effort group kill. Failures only reach the log.
pub(crate) fn kill_group(pid: u32) {
    if let Err(e) = os::kill_process_group(pid) {
        log::warn!("Failed to kill process group {}: {}", pid, e);
    }
}
