use std::path::{Path, PathBuf};

use super::{RemoteError, RemoteStore};

/// A remote store exposed as a mounted filesystem.
///
/// Remote paths are resolved beneath `root`, so with the default root of `/`
/// the remote path `/keybase/team/acme` is the local path `/keybase/team/acme`.
#[derive(Debug, Clone)]
pub struct MountedStore {
    root: PathBuf,
}

impl MountedStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_path(&self, remote: &str) -> PathBuf {
        let relative = remote
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..");
        let mut path = self.root.clone();
        path.extend(relative);
        path
    }
}

impl Default for MountedStore {
    fn default() -> Self {
        Self::new("/")
    }
}

fn io_error(path: &str) -> impl FnOnce(std::io::Error) -> RemoteError + '_ {
    move |source| RemoteError::Io {
        path: path.to_string(),
        source,
    }
}

impl RemoteStore for MountedStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        let entries = std::fs::read_dir(self.local_path(prefix)).map_err(io_error(prefix))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(prefix))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        self.local_path(path).try_exists().map_err(io_error(path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        std::fs::read(self.local_path(path)).map_err(io_error(path))
    }
}
