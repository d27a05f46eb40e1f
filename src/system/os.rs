// src/system/os.rs

//! Thin wrappers over the OS primitives the supervisor relies on.
//!
//! This is the only module allowed to call into `libc`.
#![allow(unsafe_code)]

use std::io;
use std::path::PathBuf;

/// The fields of a password-database entry the supervisor cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    /// Login name.
    pub name: String,
    /// Numeric user id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
    /// Home directory.
    pub home: PathBuf,
}

/// Sends `SIGKILL` to every process in the group led by `pgid`.
///
/// A group that no longer exists counts as killed.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid process group id"))?;
    // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
    // A negative pid addresses the whole process group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Always fails: there are no process groups to kill.
#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are not supported on this platform",
    ))
}

/// Whether the current effective user is root.
#[cfg(unix)]
pub fn is_privileged() -> bool {
    // SAFETY: geteuid(2) cannot fail and touches no memory.
    unsafe { libc::geteuid() == 0 }
}

/// Always `false`.
#[cfg(not(unix))]
pub fn is_privileged() -> bool {
    false
}

/// Looks `name` up in the password database.
///
/// `Ok(None)` means the lookup worked and no such user exists.
#[cfg(unix)]
pub fn lookup_user(name: &str) -> io::Result<Option<PasswdEntry>> {
    use std::ffi::{CStr, CString};

    const MAX_BUFFER: usize = 1 << 20;

    let c_name = CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "user name contains a NUL byte"))?;

    // SAFETY: sysconf(3) only reads a configuration value.
    let suggested = unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) };
    let mut buffer_len = usize::try_from(suggested)
        .ok()
        .filter(|len| *len > 0)
        .unwrap_or(1024);

    loop {
        let mut buffer: Vec<libc::c_char> = vec![0; buffer_len];
        // SAFETY: `passwd` is a plain C struct; all-zero is a valid (if meaningless) value
        // and getpwnam_r overwrites it before we read it.
        let mut entry: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        // SAFETY: every pointer references a live local, and `buffer.len()` is the real
        // size of the scratch buffer the string fields will point into.
        let rc = unsafe {
            libc::getpwnam_r(
                c_name.as_ptr(),
                &mut entry,
                buffer.as_mut_ptr(),
                buffer.len(),
                &mut result,
            )
        };

        if rc == libc::ERANGE && buffer_len < MAX_BUFFER {
            buffer_len *= 2;
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }

        let home = if entry.pw_dir.is_null() {
            PathBuf::from("/")
        } else {
            // SAFETY: on success pw_dir points to a NUL-terminated string inside `buffer`,
            // which is still alive here.
            PathBuf::from(unsafe { CStr::from_ptr(entry.pw_dir) }.to_string_lossy().into_owned())
        };

        return Ok(Some(PasswdEntry {
            name: name.to_owned(),
            uid: entry.pw_uid,
            gid: entry.pw_gid,
            home,
        }));
    }
}

/// Always fails with [`io::ErrorKind::Unsupported`].
#[cfg(not(unix))]
pub fn lookup_user(_name: &str) -> io::Result<Option<PasswdEntry>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "user lookup is not supported on this platform",
    ))
}
