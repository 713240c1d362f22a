//! Client settings: where to look for published records and where to keep local defaults.

mod builder;
mod env;
mod error;

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use builder::{SettingsLoader, DEFAULT_ENV_PREFIX, DEFAULT_ENV_SEPARATOR};
pub use error::SettingsError;

/// Root of the trusted remote namespace. Records are never loaded from outside it.
pub const DEFAULT_TRUSTED_ROOT: &str = "/keybase/";

/// Directory whose entries are the candidate groups (one per team).
pub const DEFAULT_NAMESPACE_PREFIX: &str = "/keybase/team/";

/// File name the CA bot publishes inside each team directory.
pub const DEFAULT_RECORD_FILENAME: &str = "kssh-client.config";

/// Maximum number of teams probed at once.
pub const DEFAULT_PARALLELISM_LIMIT: usize = 8;

/// Local defaults file, relative to the home directory.
const DEFAULT_DEFAULTS_FILE: &str = ".ssh/kssh.config";

/// Resolved client settings.
///
/// Every field has a default, so an empty source set yields a usable value.
/// Obtain one from [`SettingsLoader`] or [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trusted_root: String,
    pub namespace_prefix: String,
    pub record_filename: String,
    pub parallelism_limit: usize,
    /// Location of the local defaults file. `None` means `~/.ssh/kssh.config`.
    /// A leading `~/` is expanded against the home directory.
    pub defaults_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trusted_root: DEFAULT_TRUSTED_ROOT.to_string(),
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            record_filename: DEFAULT_RECORD_FILENAME.to_string(),
            parallelism_limit: DEFAULT_PARALLELISM_LIMIT,
            defaults_path: None,
        }
    }
}

impl Settings {
    /// Checks the invariants the scanner and loader rely on.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.parallelism_limit == 0 {
            return Err(invalid("parallelism_limit", "must be at least 1"));
        }
        if !self.trusted_root.starts_with('/') || !self.trusted_root.ends_with('/') {
            return Err(invalid(
                "trusted_root",
                format!("'{}' must be an absolute directory ending in '/'", self.trusted_root),
            ));
        }
        if !self.namespace_prefix.starts_with(&self.trusted_root) {
            return Err(invalid(
                "namespace_prefix",
                format!(
                    "'{}' is outside the trusted root '{}'",
                    self.namespace_prefix, self.trusted_root
                ),
            ));
        }
        if self.record_filename.is_empty() || self.record_filename.contains('/') {
            return Err(invalid(
                "record_filename",
                format!("'{}' must be a bare file name", self.record_filename),
            ));
        }
        Ok(())
    }

    /// Returns the absolute path of the local defaults file.
    pub fn local_defaults_path(&self) -> Result<PathBuf, SettingsError> {
        match &self.defaults_path {
            Some(path) => expand_home(path),
            None => dirs::home_dir()
                .map(|home| home.join(DEFAULT_DEFAULTS_FILE))
                .ok_or(SettingsError::NoHomeDirectory),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn expand_home(path: &Path) -> Result<PathBuf, SettingsError> {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or(SettingsError::NoHomeDirectory),
        Err(_) => Ok(path.to_path_buf()),
    }
}
