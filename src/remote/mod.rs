//! Access to the team-scoped remote file store.

mod mounted;

use std::sync::Arc;

use thiserror::Error;

pub use mounted::MountedStore;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("remote store I/O failed at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the remote store.
///
/// Paths are absolute, slash-separated remote paths such as
/// `/keybase/team/acme.ssh/kssh-client.config`. Implementations are probed
/// from several threads at once during discovery.
pub trait RemoteStore: Send + Sync {
    /// Names of the entries directly beneath `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError>;

    fn exists(&self, path: &str) -> Result<bool, RemoteError>;

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for &T {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        (**self).list(prefix)
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        (**self).exists(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        (**self).read(path)
    }
}

impl<T: RemoteStore + ?Sized> RemoteStore for Box<T> {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        (**self).list(prefix)
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        (**self).exists(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        (**self).read(path)
    }
}

impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        (**self).list(prefix)
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        (**self).exists(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        (**self).read(path)
    }
}
