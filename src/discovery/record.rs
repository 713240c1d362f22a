use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::{RemoteError, RemoteStore};

/// A client record published by the CA bot into a team directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(rename = "teamname", default)]
    pub team_name: String,
    #[serde(rename = "channelname", default)]
    pub channel_name: String,
    #[serde(rename = "botname", default)]
    pub bot_name: String,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("refusing to load a client record from outside '{trusted_root}': {location}")]
    InvalidLocation {
        location: String,
        trusted_root: String,
    },

    #[error("found a client record at {location} that could not be read: {source}")]
    LoadFailure {
        location: String,
        source: RemoteError,
    },

    #[error("failed to parse client record at {location}: {source}")]
    MalformedRecord {
        location: String,
        source: serde_json::Error,
    },

    #[error("found a client record at {location} that is missing data: {raw}")]
    IncompleteRecord { location: String, raw: String },
}

impl RecordError {
    /// Remote location the failing record was loaded from.
    pub fn location(&self) -> &str {
        match self {
            Self::InvalidLocation { location, .. }
            | Self::LoadFailure { location, .. }
            | Self::MalformedRecord { location, .. }
            | Self::IncompleteRecord { location, .. } => location,
        }
    }
}

/// Loads and validates the record at `location`.
///
/// `location` must lie beneath `trusted_root`; anything else is rejected
/// before the store is touched.
pub fn load_record<S>(store: &S, location: &str, trusted_root: &str) -> Result<RemoteRecord, RecordError>
where
    S: RemoteStore + ?Sized,
{
    if !is_within(location, trusted_root) {
        return Err(RecordError::InvalidLocation {
            location: location.to_string(),
            trusted_root: trusted_root.to_string(),
        });
    }

    let bytes = store.read(location).map_err(|source| RecordError::LoadFailure {
        location: location.to_string(),
        source,
    })?;

    let record: RemoteRecord =
        serde_json::from_slice(&bytes).map_err(|source| RecordError::MalformedRecord {
            location: location.to_string(),
            source,
        })?;

    if record.team_name.is_empty() || record.bot_name.is_empty() {
        return Err(RecordError::IncompleteRecord {
            location: location.to_string(),
            raw: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    Ok(record)
}

/// Whether `location` stays inside `root` once `.`/`..` segments are considered.
fn is_within(location: &str, root: &str) -> bool {
    let Some(rest) = location.strip_prefix(root) else {
        return false;
    };
    !rest.is_empty() && !rest.split('/').any(|segment| segment == "..")
}
