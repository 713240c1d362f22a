pub mod defaults;
pub mod discovery;
mod error;
pub mod remote;
pub mod resolver;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use defaults::{LocalDefaults, LocalDefaultsStore, LocalStoreError};
pub use discovery::{
    load_record, DiscoveryError, DiscoveryResult, DiscoveryScanner, RecordError, RemoteRecord,
};
pub use error::Error;
pub use remote::{MountedStore, RemoteError, RemoteStore};
pub use resolver::{DefaultBot, DefaultResolver, ResolverBuilder};
pub use settings::{Settings, SettingsError, SettingsLoader};
