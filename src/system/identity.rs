// src/system/identity.rs

//! Who a supervised process runs as.
//!
//! Two small collaborators of the supervisor live here: the user-identity resolver used
//! by privilege drop, and the elevation check used by `with_elevation`.

use crate::constants::ELEVATION_PREFIX;
use crate::system::os;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a user could not be resolved.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// No password-database entry for this name.
    #[error("User '{0}' does not exist.")]
    UnknownUser(String),
    /// The lookup itself failed.
    #[error("Failed to look up user '{user}'")]
    Lookup {
        /// The requested name.
        user: String,
        /// The OS error.
        #[source]
        source: io::Error,
    },
    /// The platform has no notion of switching users.
    #[error("Switching users is not supported on this platform.")]
    Unsupported,
}

/// A resolved OS principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Login name.
    pub name: String,
    /// Numeric user id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
    /// Becomes `HOME` of the process.
    pub home: PathBuf,
}

/// Resolves `name` to its numeric identity and home directory.
pub fn lookup_user(name: &str) -> Result<User, IdentityError> {
    match os::lookup_user(name) {
        Ok(Some(entry)) => Ok(User {
            name: entry.name,
            uid: entry.uid,
            gid: entry.gid,
            home: entry.home,
        }),
        Ok(None) => Err(IdentityError::UnknownUser(name.to_owned())),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => Err(IdentityError::Unsupported),
        Err(source) => Err(IdentityError::Lookup {
            user: name.to_owned(),
            source,
        }),
    }
}

/// The command prefix that runs a program with elevated privileges, or `None` when the
/// current principal already has them.
pub fn elevation_prefix() -> Option<Vec<String>> {
    elevation_prefix_with(ELEVATION_PREFIX)
}

/// Like [`elevation_prefix`] with a caller-chosen prefix.
pub fn elevation_prefix_with<S: AsRef<str>>(prefix: &[S]) -> Option<Vec<String>> {
    if os::is_privileged() {
        return None;
    }
    Some(prefix.iter().map(|s| s.as_ref().to_owned()).collect())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_root_resolves_uid_zero() {
        let user = lookup_user("root").unwrap();
        assert_eq!(user.uid, 0);
        assert_eq!(user.gid, 0);
    }

    #[test]
    fn test_unknown_user_is_reported_by_name() {
        let err = lookup_user("shellward-no-such-user").unwrap_err();
        assert!(matches!(err, IdentityError::UnknownUser(ref name) if name == "shellward-no-such-user"));
    }

    #[test]
    fn test_elevation_prefix_depends_on_privilege() {
        let prefix = elevation_prefix_with(&["doas"]);
        if os::is_privileged() {
            assert!(prefix.is_none());
        } else {
            assert_eq!(prefix, Some(vec!["doas".to_owned()]));
        }
    }
}
