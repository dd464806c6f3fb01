//! Application configuration management.
//!
//! Handles loading, saving, and validating bleunlock configuration:
//! - Locations of the system Bluetooth device catalogs
//! - Location and calendar of the lock/unlock event log
//! - HTTP bind address
//! - Logging mode
//!
//! Values come from an optional TOML file, overridden by `BLEUNLOCK_*`
//! environment variables (nested keys use `__`, e.g.
//! `BLEUNLOCK_EVENT_LOG__PATH=/tmp/TimeLog.db`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event_log::Calendar;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "BLEUNLOCK";

/// Errors raised while loading, saving, or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Layering the file and environment sources failed.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// Writing the config file failed.
    #[error("Failed to write {}: {source}", .path.display())]
    WriteError {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field name.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields are invalid.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// System Bluetooth device catalogs.
    pub devices: DevicesConfig,

    /// Lock/unlock event log.
    pub event_log: EventLogConfig,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Locations of the two catalogs maintained by the OS Bluetooth stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Catalog of devices that went through pairing.
    pub paired_db: PathBuf,

    /// Catalog of every other device the stack has seen.
    pub other_db: PathBuf,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self {
                paired_db: PathBuf::from(
                    "/Library/Bluetooth/com.apple.MobileBluetooth.ledevices.paired.db",
                ),
                other_db: PathBuf::from(
                    "/Library/Bluetooth/com.apple.MobileBluetooth.ledevices.other.db",
                ),
            }
        }
        #[cfg(not(target_os = "macos"))]
        {
            let dir = default_data_dir().join("bluetooth");
            Self {
                paired_db: dir.join("ledevices.paired.db"),
                other_db: dir.join("ledevices.other.db"),
            }
        }
    }
}

/// Event log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// SQLite file holding the `Log` table.
    pub path: PathBuf,

    /// IANA zone used to derive day keys. Unset means the system local zone.
    pub timezone: Option<String>,

    /// Create the `Log` table at startup if the file or table is missing.
    pub create_if_missing: bool,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("TimeLog.db"),
            timezone: None,
            create_if_missing: false,
        }
    }
}

impl EventLogConfig {
    /// Calendar used to bucket events into days.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `timezone` is not a known IANA name.
    pub fn calendar(&self) -> ConfigResult<Calendar> {
        match self.timezone.as_deref() {
            None => Ok(Calendar::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(Calendar::Zone)
                .map_err(|e| ConfigError::ValidationError {
                    field: "event_log.timezone",
                    message: e.to_string(),
                }),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `bind` is not a socket address.
    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::ValidationError {
                field: "server.bind",
                message: format!("'{}': {e}", self.bind),
            })
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON file logs plus compact stdout instead of pretty stdout.
    pub production: bool,

    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            production: false,
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, or a
    /// load/validation error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::build(Some(path))
    }

    /// Like [`Config::load`], falling back to defaults when the file is missing.
    ///
    /// Environment overrides apply in both cases.
    ///
    /// # Errors
    ///
    /// Returns a load or validation error.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::build(Some(path))
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::build(None)
        }
    }

    fn build(file: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the single failure, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.event_log.calendar() {
            errors.push(e);
        }
        if let Err(e) = self.server.bind_addr() {
            errors.push(e);
        }
        if self.event_log.path.as_os_str().is_empty() {
            errors.push(ConfigError::ValidationError {
                field: "event_log.path",
                message: "must not be empty".to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            errors.push(ConfigError::ValidationError {
                field: "logging.level",
                message: "must not be empty".to_string(),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Default location for bleunlock's own data.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "bleunlock")
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf())
}

/// Default location of the config file.
///
/// On Linux: `/etc/bleunlock/config.toml`
/// Elsewhere: the platform config dir, e.g. `~/Library/Application Support/bleunlock/`
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/bleunlock/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "bleunlock").map_or_else(
            || PathBuf::from("config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.event_log.calendar().unwrap(), Calendar::Local);
        assert!(!config.event_log.create_if_missing);
        assert!(config.event_log.path.ends_with("TimeLog.db"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.event_log.path = dir.path().join("TimeLog.db");
        config.event_log.timezone = Some("Asia/Shanghai".to_string());
        config.server.bind = "0.0.0.0:8080".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.event_log.calendar().unwrap(),
            Calendar::Zone(chrono_tz::Asia::Shanghai)
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[event_log]\npath = \"/tmp/custom.db\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.event_log.path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.devices, DevicesConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");

        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(_))));
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let mut config = Config::default();
        config.event_log.timezone = Some("Mars/Olympus_Mons".to_string());

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError {
                field: "event_log.timezone",
                ..
            }
        ));
    }

    #[test]
    fn test_multiple_validation_errors() {
        let mut config = Config::default();
        config.event_log.timezone = Some("Nowhere/Land".to_string());
        config.server.bind = "not an address".to_string();

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nbind = ").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::LoadError(_))));
    }
}
