use crate::defaults::LocalStoreError;
use crate::discovery::{DiscoveryError, RecordError};
use crate::settings::SettingsError;
use thiserror::Error;

/// Top-level error type for the botca-client library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    LocalStore(#[from] LocalStoreError),

    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    #[error("cannot set default bot: no team publishes a client record for bot '{0}'")]
    UnknownBot(String),

    #[error(
        "did not find a client record matching botname={0} \
         (is the CA bot running and are you in the correct teams?)"
    )]
    BotNotFound(String),

    #[error("did not find any client records (is the CA bot running and are you in the correct teams?)")]
    NoBotsDiscovered,

    #[error("found several CA bots ({}); choose one and set it as the default bot", .0.join(", "))]
    AmbiguousBot(Vec<String>),

    #[error("resolver requires a remote store")]
    MissingRemote,
}
