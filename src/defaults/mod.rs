//! The client-local defaults file.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LocalStoreError {
    #[error("failed to read local defaults file '{path}': {source}")]
    Corrupt { path: PathBuf, source: BoxError },

    #[error("failed to write local defaults file '{path}': {source}")]
    WriteFailure { path: PathBuf, source: BoxError },
}

/// Defaults chosen by the user on this machine.
///
/// The team is stored next to the bot so the common path never has to scan
/// the remote store to find it. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDefaults {
    #[serde(rename = "default_bot")]
    pub default_bot_name: String,
    #[serde(rename = "default_team")]
    pub default_bot_team: String,
    pub default_ssh_user: String,
}

/// Reads and writes [`LocalDefaults`] at a fixed path.
#[derive(Debug, Clone)]
pub struct LocalDefaultsStore {
    path: PathBuf,
}

impl LocalDefaultsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored defaults, or all-empty defaults if the file doesn't exist.
    pub fn read(&self) -> Result<LocalDefaults, LocalStoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no local defaults file yet");
                return Ok(LocalDefaults::default());
            }
            Err(e) => return Err(self.corrupt(e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e))
    }

    /// Replaces the stored defaults.
    ///
    /// The file is written in place with owner-only permissions; a crash
    /// mid-write can leave it truncated.
    pub fn write(&self, defaults: &LocalDefaults) -> Result<(), LocalStoreError> {
        let bytes = serde_json::to_vec(defaults).map_err(|e| self.write_failure(e))?;

        if let Some(parent) = self.path.parent() {
            create_private_dir(parent).map_err(|e| self.write_failure(e))?;
        }

        let mut file = open_private(&self.path).map_err(|e| self.write_failure(e))?;
        file.write_all(&bytes).map_err(|e| self.write_failure(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.write_failure(e))?;
        }

        debug!(path = %self.path.display(), "wrote local defaults");
        Ok(())
    }

    /// Reads, applies `change`, writes back, and returns what was written.
    pub fn update<F>(&self, change: F) -> Result<LocalDefaults, LocalStoreError>
    where
        F: FnOnce(&mut LocalDefaults),
    {
        let mut defaults = self.read()?;
        change(&mut defaults);
        self.write(&defaults)?;
        Ok(defaults)
    }

    fn corrupt(&self, source: impl Into<BoxError>) -> LocalStoreError {
        LocalStoreError::Corrupt {
            path: self.path.clone(),
            source: source.into(),
        }
    }

    fn write_failure(&self, source: impl Into<BoxError>) -> LocalStoreError {
        LocalStoreError::WriteFailure {
            path: self.path.clone(),
            source: source.into(),
        }
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
