//! Configuration loading and validation for pbsync.
//!
//! Configuration is layered with [`figment`], later layers overriding earlier
//! ones:
//!
//! 1. Built-in defaults ([`Config::default`]), which match a stock PocketBook
//!    device.
//! 2. A configuration file. Either the explicit path handed to
//!    [`Config::load`], or `pbsync.{toml,yaml,yml,json}` inside the platform
//!    configuration directory.
//! 3. Environment variables prefixed with `PBSYNC_`. Nested keys are separated
//!    by a double underscore (`PBSYNC_DATABASE__BUSY_TIMEOUT_MS=500`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Location of the device-wide library database on PocketBook firmware.
pub const DEFAULT_DATABASE: &str = "/mnt/ext1/system/explorer-3/explorer-3.db";
const ENV_PREFIX: &str = "PBSYNC_";
const FILE_STEM: &str = "pbsync";
const FILE_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub settings: SettingsConfig,
}

/// Connection settings for the external device database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Upper bound (in milliseconds) on how long a statement waits for a lock
    /// held by another process before failing with SQLITE_BUSY. This is also
    /// the upper bound on how long a session-end handler can block the host.
    pub busy_timeout_ms: u64,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE),
            busy_timeout_ms: 2000,
        }
    }
}
impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Consecutive failed progress writes before external writes are
    /// disabled for the rest of the session.
    pub circuit_threshold: u32,
    /// An exit event arriving within this many milliseconds of a completed
    /// sync is not synced again.
    pub exit_debounce_ms: u64,
    /// Profile used when the device reports no active profile, or the active
    /// profile cannot be found in the database.
    pub default_profile_id: i64,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            circuit_threshold: 3,
            exit_debounce_ms: 2000,
            default_profile_id: 1,
        }
    }
}
impl SyncConfig {
    pub fn exit_debounce(&self) -> Duration {
        Duration::from_millis(self.exit_debounce_ms)
    }
}

/// Where the JSON-backed host stores live when the host does not provide its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from defaults, a configuration file and the
    /// environment, then validate it.
    ///
    /// An explicit `path` must exist. Without one, the platform configuration
    /// directory is searched and a missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => {
                if !path.is_file() {
                    tracing::warn!(path = %path.display(), "Configuration file does not exist");
                    exn::bail!(ErrorKind::Load);
                }
                figment = Self::merge_file(figment, path);
            },
            None => {
                if let Some(found) = Self::discover() {
                    tracing::debug!(path = %found.display(), "Discovered configuration file");
                    figment = Self::merge_file(figment, &found);
                }
            },
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but make no sense at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.database.busy_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("database.busy_timeout_ms"));
        }
        if self.sync.circuit_threshold == 0 {
            exn::bail!(ErrorKind::Invalid("sync.circuit_threshold"));
        }
        if self.sync.default_profile_id < 1 {
            exn::bail!(ErrorKind::Invalid("sync.default_profile_id"));
        }
        Ok(())
    }

    /// Platform configuration directory (e.g. `~/.config/pbsync` on Linux).
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", FILE_STEM).map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn discover() -> Option<PathBuf> {
        let dir = Self::config_dir()?;
        FILE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{FILE_STEM}.{ext}")))
            .find(|candidate| candidate.is_file())
    }

    fn merge_file(figment: Figment, path: &Path) -> Figment {
        // Anything that isn't obviously YAML or JSON is assumed to be TOML.
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        }
    }
}
