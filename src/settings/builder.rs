use std::path::{Path, PathBuf};

use super::env::load_env_vars;
use super::{Settings, SettingsError};

/// Prefix used by [`SettingsLoader::with_default_env`].
pub const DEFAULT_ENV_PREFIX: &str = "BOTCA";

/// Separator used by [`SettingsLoader::with_default_env`].
pub const DEFAULT_ENV_SEPARATOR: &str = "__";

/// A settings source in the loading pipeline.
#[derive(Debug)]
enum Source {
    File { path: PathBuf, required: bool },
    Env { prefix: String, separator: String },
}

/// Builder for loading [`Settings`] from TOML files and environment variables.
///
/// Sources are merged in registration order, later ones overriding earlier
/// ones. Keys no source provides keep their [`Settings::default`] value.
///
/// ```no_run
/// use botca_client::SettingsLoader;
///
/// let settings = SettingsLoader::new()
///     .with_file("/etc/botca/client.toml", false)
///     .with_default_env()
///     .load()?;
/// # Ok::<(), botca_client::SettingsError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "loaders do nothing until .load() is called"]
pub struct SettingsLoader {
    sources: Vec<Source>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a TOML file.
    ///
    /// If `required` is `true`, loading fails when the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.sources.push(Source::File {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Adds environment variables named `{prefix}{separator}{key}`.
    ///
    /// Keys are lowercased and values coerced to integer, float, boolean or
    /// string, in that order of preference.
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.sources.push(Source::Env {
            prefix: prefix.into(),
            separator: separator.into(),
        });
        self
    }

    /// Adds `BOTCA__*` environment variables.
    pub fn with_default_env(self) -> Self {
        self.with_env(DEFAULT_ENV_PREFIX, DEFAULT_ENV_SEPARATOR)
    }

    /// Merges all sources, deserializes and validates the result.
    pub fn load(self) -> Result<Settings, SettingsError> {
        let mut merged = toml::Table::new();

        for source in self.sources {
            match source {
                Source::File { path, required } => {
                    if let Some(table) = load_settings_file(&path, required)? {
                        deep_merge(&mut merged, table);
                    }
                }
                Source::Env { prefix, separator } => {
                    load_env_vars(&mut merged, &prefix, &separator);
                }
            }
        }

        let settings: Settings = toml::Value::Table(merged).try_into()?;
        settings.validate()?;
        tracing::debug!(?settings, "loaded client settings");
        Ok(settings)
    }
}

/// Loads and parses a TOML settings file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_settings_file(path: &Path, required: bool) -> Result<Option<toml::Table>, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| SettingsError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(SettingsError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(SettingsError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
