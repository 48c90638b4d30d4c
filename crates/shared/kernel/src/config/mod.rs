use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of environment overrides (`SHELF__SERVER__PORT=9000`).
pub const ENV_PREFIX: &str = "SHELF";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_FILE: &str = "server";

#[shelf_derive::shelf_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Layered configuration: built-in defaults, then an optional file, then environment.
///
/// 1. **Defaults**: whatever `T`'s `#[serde(default)]` provides.
/// 2. **File**: `server.{toml,json,yaml,...}` (or the given path). Missing files are skipped
///    unless [`ConfigLoader::require_file`] is set.
/// 3. **Environment**: variables prefixed with `SHELF__`; nested keys use `__`
///    (`SHELF__STORAGE__DATA_DIR` maps to `storage.data_dir`).
#[derive(Debug)]
pub struct ConfigLoader {
    file: PathBuf,
    required: bool,
    env: Option<config::Map<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self { file: PathBuf::from(DEFAULT_FILE), required: false, env: None }
    }
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = path.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub const fn require_file(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Replaces the process environment with an explicit map (keys keep the `SHELF__` prefix).
    #[must_use]
    pub fn env_source<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Builds and deserializes the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::Config`] if a required file is missing, a source is malformed
    /// or the merged values do not fit `T`.
    pub fn load<T>(self) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        info!(file = %self.file.display(), required = self.required, "Loading configuration");

        Config::builder()
            .add_source(File::from(self.file.as_path()).required(self.required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .convert_case(config::Case::Snake)
                    .source(self.env),
            )
            .build()
            .context("Failed to build config")?
            .try_deserialize::<T>()
            .context("Failed to deserialize config")
    }
}

/// Loads `T` from an optional file (default `server`) plus `SHELF__*` overrides.
///
/// # Errors
/// See [`ConfigLoader::load`].
///
/// # Example
/// ```rust,no_run
/// use shelf_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// #[serde(default)]
/// struct Settings {
///     port: u16,
/// }
///
/// let cfg: Settings = load_config(Some("config/local")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let loader = ConfigLoader::new();
    match path {
        Some(path) => loader.file(path).require_file(true).load(),
        None => loader.load(),
    }
}
