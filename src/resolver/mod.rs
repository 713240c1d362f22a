//! Picking the bot, team and ssh user to use when the caller gives none.
//!
//! Reads of the defaults never touch the remote store. Only choosing a new
//! default bot, or resolving a bot with no default set, pays for a full scan.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::defaults::{LocalDefaults, LocalDefaultsStore};
use crate::discovery::{load_record, DiscoveryResult, DiscoveryScanner, RemoteRecord};
use crate::remote::RemoteStore;
use crate::settings::Settings;
use crate::Error;

/// Characters that cannot appear in an ssh user name.
const FORBIDDEN_USERNAME_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\'', '"'];

/// A bot together with the team that publishes its client record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultBot {
    pub bot_name: String,
    pub team_name: String,
}

/// Answers "which bot, team and ssh user" from local defaults, falling back
/// to a scan of the remote store.
///
/// ## Example
///
/// ```no_run
/// use botca_client::{DefaultResolver, MountedStore, SettingsLoader};
///
/// let resolver = DefaultResolver::builder()
///     .with_remote(MountedStore::default())
///     .with_settings(SettingsLoader::new().with_default_env().load()?)
///     .build()?;
///
/// let bot = resolver.resolve_bot(None)?;
/// println!("using {} from {}", bot.bot_name, bot.team_name);
/// # Ok::<(), botca_client::Error>(())
/// ```
#[derive(Debug)]
pub struct DefaultResolver<S> {
    remote: S,
    scanner: DiscoveryScanner,
    trusted_root: String,
    defaults: LocalDefaultsStore,
}

impl DefaultResolver<()> {
    /// Creates a new builder for constructing a `DefaultResolver`.
    pub fn builder() -> ResolverBuilder<()> {
        ResolverBuilder {
            remote: None,
            settings: None,
            defaults_path: None,
        }
    }
}

impl<S: RemoteStore> DefaultResolver<S> {
    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn defaults_store(&self) -> &LocalDefaultsStore {
        &self.defaults
    }

    /// Scans every team for published client records.
    pub fn discover(&self) -> Result<DiscoveryResult, Error> {
        Ok(self.scanner.scan(&self.remote)?)
    }

    /// Loads a single record from a fully qualified remote location.
    pub fn load_record(&self, location: &str) -> Result<RemoteRecord, Error> {
        Ok(load_record(&self.remote, location, &self.trusted_root)?)
    }

    pub fn default_ssh_user(&self) -> Result<String, Error> {
        Ok(self.defaults.read()?.default_ssh_user)
    }

    /// Stores the ssh user to log in as. An empty name clears it.
    pub fn set_default_ssh_user(&self, username: &str) -> Result<(), Error> {
        if username.contains(FORBIDDEN_USERNAME_CHARS) {
            return Err(Error::InvalidUsername(username.to_string()));
        }

        self.defaults
            .update(|d| d.default_ssh_user = username.to_string())?;
        Ok(())
    }

    /// The stored default bot, if any. Never scans.
    pub fn default_bot(&self) -> Result<Option<DefaultBot>, Error> {
        let LocalDefaults {
            default_bot_name,
            default_bot_team,
            ..
        } = self.defaults.read()?;

        if default_bot_name.is_empty() {
            return Ok(None);
        }
        Ok(Some(DefaultBot {
            bot_name: default_bot_name,
            team_name: default_bot_team,
        }))
    }

    /// Stores `bot_name` as the default bot together with its team.
    ///
    /// A non-empty name is checked against a full scan first so later reads
    /// can use the stored team directly. An empty name clears the default.
    pub fn set_default_bot(&self, bot_name: &str) -> Result<(), Error> {
        let team_name = if bot_name.is_empty() {
            String::new()
        } else {
            self.team_for_bot(bot_name).map_err(|e| match e {
                Error::BotNotFound(name) => Error::UnknownBot(name),
                other => other,
            })?
        };

        self.defaults.update(|d| {
            d.default_bot_name = bot_name.to_string();
            d.default_bot_team = team_name.clone();
        })?;
        info!(bot = %bot_name, team = %team_name, "updated default bot");
        Ok(())
    }

    /// Finds the team publishing `bot_name`. Always scans.
    pub fn team_for_bot(&self, bot_name: &str) -> Result<String, Error> {
        self.discover()?
            .get(bot_name)
            .map(|record| record.team_name.clone())
            .ok_or_else(|| Error::BotNotFound(bot_name.to_string()))
    }

    /// Picks the bot to use.
    ///
    /// An explicit name is looked up remotely. Otherwise the stored default is
    /// returned as is. With neither, a scan must find exactly one bot.
    pub fn resolve_bot(&self, explicit: Option<&str>) -> Result<DefaultBot, Error> {
        if let Some(bot_name) = explicit.filter(|name| !name.is_empty()) {
            return Ok(DefaultBot {
                bot_name: bot_name.to_string(),
                team_name: self.team_for_bot(bot_name)?,
            });
        }

        if let Some(default) = self.default_bot()? {
            return Ok(default);
        }

        let mut discovered = self.discover()?.into_records().into_values();
        match (discovered.next(), discovered.next()) {
            (None, _) => Err(Error::NoBotsDiscovered),
            (Some(record), None) => Ok(DefaultBot {
                bot_name: record.bot_name,
                team_name: record.team_name,
            }),
            (Some(first), Some(second)) => {
                let mut names: Vec<String> = [first, second]
                    .into_iter()
                    .chain(discovered)
                    .map(|record| record.bot_name)
                    .collect();
                names.sort();
                Err(Error::AmbiguousBot(names))
            }
        }
    }
}

/// Builder for constructing a [`DefaultResolver`].
///
/// The builder starts without a remote store (`ResolverBuilder<()>`) and
/// transitions to `ResolverBuilder<S>` when [`with_remote`](Self::with_remote)
/// is called. Settings default to [`Settings::default`].
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ResolverBuilder<S> {
    remote: Option<S>,
    settings: Option<Settings>,
    defaults_path: Option<PathBuf>,
}

impl ResolverBuilder<()> {
    /// Attaches the remote store records are discovered in.
    pub fn with_remote<S: RemoteStore>(self, remote: S) -> ResolverBuilder<S> {
        ResolverBuilder {
            remote: Some(remote),
            settings: self.settings,
            defaults_path: self.defaults_path,
        }
    }
}

impl<S> ResolverBuilder<S> {
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Overrides the local defaults file named by the settings.
    pub fn with_defaults_path(mut self, path: impl AsRef<Path>) -> Self {
        self.defaults_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Builds the `DefaultResolver`.
    ///
    /// Returns an error if no remote store was provided or the settings are invalid.
    pub fn build(self) -> Result<DefaultResolver<S>, Error> {
        let remote = self.remote.ok_or(Error::MissingRemote)?;
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        let defaults_path = match self.defaults_path {
            Some(path) => path,
            None => settings.local_defaults_path()?,
        };

        Ok(DefaultResolver {
            remote,
            scanner: DiscoveryScanner::new(&settings),
            trusted_root: settings.trusted_root,
            defaults: LocalDefaultsStore::new(defaults_path),
        })
    }
}
