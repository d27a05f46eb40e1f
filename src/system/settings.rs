// src/system/settings.rs

//! The optional `config.toml` that tunes the command-line front-end.

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_ENV_VAR, CONFIG_FILENAME, DEFAULT_SHELL, ELEVATION_PREFIX,
    SHELL_SCRIPT_FLAG, STDERR_CAPTURE_BUDGET,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from locating or reading `config.toml`.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The platform reports no config directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// The file exists but could not be read.
    #[error("Could not read settings file '{path}': {source}")]
    Io {
        /// The settings file.
        path: String,
        /// The underlying read error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML or has unknown keys.
    #[error("Failed to parse TOML in '{path}': {source}")]
    TomlParse {
        /// The settings file.
        path: String,
        /// What the parser rejected.
        #[source]
        source: toml::de::Error,
    },
}

/// User preferences. Every field may be left out of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Interpreter for shell templates.
    pub shell: String,
    /// The flag that makes `shell` read a script from its next argument.
    pub shell_flag: String,
    /// Prefix used by `--sudo` when not already root.
    pub elevation: Vec<String>,
    /// Head and tail bytes of stderr kept for error reports.
    pub stderr_budget: usize,
    /// Default timeout for `run` and `exec`.
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_owned(),
            shell_flag: SHELL_SCRIPT_FLAG.to_owned(),
            elevation: ELEVATION_PREFIX.iter().map(|s| (*s).to_owned()).collect(),
            stderr_budget: STDERR_CAPTURE_BUDGET,
            timeout_secs: None,
        }
    }
}

impl Settings {
    /// `timeout_secs` as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Loads settings from `explicit`, or from the default location.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_settings_path()?,
        };
        Self::load_from(&path)
    }

    /// Reads `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No settings file at '{}', using defaults.", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        let settings = toml::from_str(&content).map_err(|source| SettingsError::TomlParse {
            path: path.display().to_string(),
            source,
        })?;
        log::debug!("Loaded settings from '{}'.", path.display());
        Ok(settings)
    }
}

/// `$SHELLWARD_CONFIG` (with `~` expanded) or `<config dir>/shellward/config.toml`.
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR)
        && !raw.is_empty()
    {
        return Ok(PathBuf::from(shellexpand::tilde(&raw).into_owned()));
    }
    Ok(dirs::config_dir()
        .ok_or(SettingsError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.shell, "sh");
        assert_eq!(settings.elevation, vec!["sudo", "-E"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "shell = \"bash\"\ntimeout_secs = 5\n").unwrap();

        // --- Execution ---
        let settings = Settings::load_from(&path).unwrap();

        // --- Assertions ---
        assert_eq!(settings.shell, "bash");
        assert_eq!(settings.shell_flag, "-c");
        assert_eq!(settings.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(settings.stderr_budget, STDERR_CAPTURE_BUDGET);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "shell = [unclosed").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, SettingsError::TomlParse { .. }));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "shel = \"bash\"\n").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "elevation = [\"doas\"]\n").unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.elevation, vec!["doas"]);
    }
}
