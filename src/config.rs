use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::workflows::WorkflowOptions;

/// Environment variable selecting the active configuration profile
pub const PROFILE_ENV_VAR: &str = "BLOB_WALKTHROUGH_ENVIRONMENT";
/// Prefix for environment variable overrides, e.g.
/// `BLOB_WALKTHROUGH__STORAGEACCOUNT__CONNECTIONSTRING`
pub const ENV_PREFIX: &str = "BLOB_WALKTHROUGH";
/// Separator between the prefix and each nested key in environment variables
pub const ENV_SEPARATOR: &str = "__";
/// Base settings file name; profile overlays are `appsettings.{Profile}.json`
pub const BASE_SETTINGS_FILE: &str = "appsettings.json";

const STORAGE_SECTION: &str = "storageAccount";
const CONNECTION_STRING_KEY: &str = "storageAccount.connectionString";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required configuration section `{section}` is missing")]
    MissingRequiredSection { section: String },
    #[error("Required configuration file not found: {}", .path.display())]
    MissingFile { path: PathBuf },
    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Source(#[from] ::config::ConfigError),
}

/// Resolved settings for one walkthrough run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Storage account credential
    pub storage_account: StorageAccountSettings,
    /// Naming and payload options for the workflow
    pub workflow: WorkflowOptions,
}

#[derive(Clone, PartialEq, Eq)]
pub struct StorageAccountSettings {
    /// Opaque credential granting access to the storage account
    pub connection_string: String,
}

// Keeps account keys out of logs and panic messages
impl std::fmt::Debug for StorageAccountSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccountSettings")
            .field("connection_string", &"<redacted>")
            .finish()
    }
}

impl Settings {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            storage_account: StorageAccountSettings {
                connection_string: connection_string.into(),
            },
            workflow: WorkflowOptions::default(),
        }
    }

    pub fn connection_string(&self) -> &str {
        &self.storage_account.connection_string
    }
}

// Every layer is normalised to lowercase keys before merging: environment
// variables arrive lowercased, so file keys must match them for overrides to land.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default, rename = "storageaccount", alias = "storage_account")]
    storage_account: Option<RawStorageAccount>,
    #[serde(default)]
    workflow: Option<WorkflowOptions>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStorageAccount {
    #[serde(default, rename = "connectionstring", alias = "connection_string")]
    connection_string: Option<String>,
}

fn lowercase_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), lowercase_keys(value)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(lowercase_keys).collect())
        }
        other => other,
    }
}

/// Parse a JSON layer into normalised text; `None` when it holds no keys
fn normalize_json(contents: &str, origin: &str) -> Result<Option<String>, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value =
        serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
    Ok(Some(lowercase_keys(value).to_string()))
}

/// One key-value source in the merge, applied in list order
#[derive(Debug, Clone)]
pub enum ConfigLayer {
    /// JSON document on disk
    JsonFile { path: PathBuf, required: bool },
    /// JSON document held in memory
    Json { name: String, contents: String },
    /// Prefixed environment variables; `vars` replaces the process environment when set
    Environment {
        prefix: String,
        vars: Option<HashMap<String, String>>,
    },
}

impl ConfigLayer {
    pub fn json_file(path: impl Into<PathBuf>, required: bool) -> Self {
        ConfigLayer::JsonFile {
            path: path.into(),
            required,
        }
    }

    pub fn process_env() -> Self {
        ConfigLayer::Environment {
            prefix: ENV_PREFIX.to_string(),
            vars: None,
        }
    }

    pub fn env_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ConfigLayer::Environment {
            prefix: ENV_PREFIX.to_string(),
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Merges an ordered list of layers into [`Settings`]; later layers win
#[derive(Debug, Clone, Default)]
pub struct SettingsResolver {
    layers: Vec<ConfigLayer>,
}

impl SettingsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: ConfigLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Standard layout with precedence:
    /// 1. `appsettings.json` in `config_dir`
    /// 2. `appsettings.{profile}.json` in `config_dir`, when a profile is given
    /// 3. Environment variables (prefixed with BLOB_WALKTHROUGH__)
    ///
    /// Every file layer is optional; an unsatisfied credential is reported
    /// as a missing section instead.
    pub fn standard(config_dir: &Path, profile: Option<&str>) -> Self {
        let mut resolver =
            Self::new().with_layer(ConfigLayer::json_file(config_dir.join(BASE_SETTINGS_FILE), false));

        if let Some(profile) = profile.map(str::trim).filter(|p| !p.is_empty()) {
            resolver = resolver.with_layer(ConfigLayer::json_file(
                config_dir.join(format!("appsettings.{profile}.json")),
                false,
            ));
        }

        resolver.with_layer(ConfigLayer::process_env())
    }

    /// Standard layout with the profile read from [`PROFILE_ENV_VAR`]
    pub fn from_process_env(config_dir: &Path) -> Self {
        let profile = std::env::var(PROFILE_ENV_VAR).ok();
        Self::standard(config_dir, profile.as_deref())
    }

    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();

        for layer in &self.layers {
            match layer {
                ConfigLayer::JsonFile { path, required } => {
                    let contents = match std::fs::read_to_string(path) {
                        Ok(contents) => contents,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            if *required {
                                return Err(ConfigError::MissingFile { path: path.clone() });
                            }
                            tracing::debug!(path = %path.display(), "Optional settings file not present");
                            continue;
                        }
                        Err(source) => {
                            return Err(ConfigError::Read {
                                path: path.clone(),
                                source,
                            })
                        }
                    };
                    match normalize_json(&contents, &path.display().to_string())? {
                        Some(json) => {
                            tracing::debug!(path = %path.display(), "Loading settings file");
                            builder = builder.add_source(File::from_str(&json, FileFormat::Json));
                        }
                        None => tracing::debug!(path = %path.display(), "Settings file is empty"),
                    }
                }
                ConfigLayer::Json { name, contents } => {
                    if let Some(json) = normalize_json(contents, name)? {
                        tracing::debug!(layer = %name, "Loading inline settings");
                        builder = builder.add_source(File::from_str(&json, FileFormat::Json));
                    }
                }
                ConfigLayer::Environment { prefix, vars } => {
                    builder = builder.add_source(
                        Environment::with_prefix(prefix)
                            .prefix_separator(ENV_SEPARATOR)
                            .separator(ENV_SEPARATOR)
                            .source(vars.clone()),
                    );
                }
            }
        }

        let raw: RawSettings = builder.build()?.try_deserialize()?;

        let section = raw
            .storage_account
            .ok_or_else(|| ConfigError::MissingRequiredSection {
                section: STORAGE_SECTION.to_string(),
            })?;

        let connection_string = section
            .connection_string
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequiredSection {
                section: CONNECTION_STRING_KEY.to_string(),
            })?;

        Ok(Settings {
            storage_account: StorageAccountSettings { connection_string },
            workflow: raw.workflow.unwrap_or_default(),
        })
    }
}

/// Resolve settings from the working directory and the process environment
pub fn resolve() -> Result<Settings, ConfigError> {
    SettingsResolver::from_process_env(Path::new(".")).resolve()
}

/// Load .env file if it exists
pub fn load_env_file() -> anyhow::Result<()> {
    if Path::new(".env").exists() {
        dotenvy::dotenv()?;
        tracing::info!("Loaded environment variables from .env file");
    }
    Ok(())
}
