//! # Configuration
//!
//! Settings are read from a JSON file shaped like the service's app
//! settings (PascalCase sections), then selected values are overridden
//! from the environment. A missing file means defaults.

use libprobe_core::{ConnectionStrings, DbKey};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Env var naming the settings file
pub const CONFIG_PATH_ENV: &str = "LIBPROBE_CONFIG";
/// Settings file used when [`CONFIG_PATH_ENV`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "appsettings.json";

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`]
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// An environment override could not be parsed
    #[error("invalid value '{value}' for {key}")]
    InvalidValue {
        /// Env var name
        key: &'static str,
        /// Offending value
        value: String,
    },
}

/// Something worth reporting about how the settings were assembled
///
/// Settings load before the subscriber exists, so these are collected
/// and logged once tracing is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No settings file was found; defaults were used
    DefaultsUsed {
        /// Path that was tried
        path: PathBuf,
    },
    /// A switch target has no connection string
    MissingConnectionString {
        /// Database without a connection string
        key: DbKey,
    },
}

impl Notice {
    /// Emit this notice through `tracing`
    pub fn log(&self) {
        match self {
            Self::DefaultsUsed { path } => {
                info!(path = %path.display(), "No settings file found, using defaults");
            }
            Self::MissingConnectionString { key } => {
                warn!(database = %key, "No connection string configured");
            }
        }
    }
}

/// API identification echoed by the version endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiInfo {
    /// Deployed API version
    pub version: String,
    /// Source repository URL
    pub repository: String,
}

impl Default for ApiInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            repository: env!("CARGO_PKG_REPOSITORY").to_string(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerSettings {
    /// Listen address
    pub address: SocketAddr,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Seconds to wait for open connections on shutdown
    pub shutdown_timeout_secs: u64,
    /// Value of Access-Control-Allow-Origin
    pub cors_origin: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: ([0, 0, 0, 0], 8000).into(),
            max_body_size: 1024 * 1024,
            shutdown_timeout_secs: 30,
            cors_origin: "*".to_string(),
        }
    }
}

impl ServerSettings {
    /// Shutdown drain timeout
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Tunables of the probe endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProbeSettings {
    /// Steps of the long-running operation
    pub step_count: usize,
    /// Delay of each long-running step, in milliseconds
    pub step_delay_ms: u64,
    /// Wait of the delayed-response endpoint, in seconds
    pub delayed_response_secs: u64,
    /// Whether the crash endpoint may abort the process
    pub enable_crash: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            step_count: 10,
            step_delay_ms: 1000,
            delayed_response_secs: 60,
            enable_crash: false,
        }
    }
}

impl ProbeSettings {
    /// Delay of each long-running step
    pub const fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    /// Wait of the delayed-response endpoint
    pub const fn delayed_response(&self) -> Duration {
        Duration::from_secs(self.delayed_response_secs)
    }
}

/// Log filter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// API identification
    #[serde(rename = "APIInfo")]
    pub api_info: ApiInfo,
    /// The two switchable databases
    pub connection_strings: ConnectionStrings,
    /// Database selected at startup
    pub default_database: DbKey,
    /// Free-form marker used to check which environment is deployed
    pub env_check: Option<String>,
    /// Host filter advertised by the deployment
    pub allowed_hosts: Option<String>,
    /// HTTP listener
    pub server: ServerSettings,
    /// Probe endpoint tunables
    pub probes: ProbeSettings,
    /// Logging
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_info: ApiInfo::default(),
            connection_strings: ConnectionStrings::default(),
            default_database: DbKey::New,
            env_check: None,
            allowed_hosts: None,
            server: ServerSettings::default(),
            probes: ProbeSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Load from the file named by `LIBPROBE_CONFIG` (or `appsettings.json`)
    /// and apply process environment overrides
    ///
    /// # Errors
    ///
    /// See [`Settings::read`] and [`Settings::apply_env`]
    pub fn from_env() -> Result<(Self, Vec<Notice>), ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::assemble(Path::new(&path), |key| std::env::var(key).ok())
    }

    /// Read `path`, fall back to defaults, apply overrides from `lookup`
    /// and collect notices about the result
    ///
    /// # Errors
    ///
    /// See [`Settings::read`] and [`Settings::apply_env`]
    pub fn assemble<F>(path: &Path, lookup: F) -> Result<(Self, Vec<Notice>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut notices = Vec::new();
        let mut settings = Self::read(path)?.unwrap_or_else(|| {
            notices.push(Notice::DefaultsUsed {
                path: path.to_path_buf(),
            });
            Self::default()
        });
        settings.apply_env(lookup)?;
        notices.extend(settings.notices());
        Ok((settings, notices))
    }

    /// Read settings from a JSON file; `Ok(None)` when it does not exist
    ///
    /// # Errors
    ///
    /// `ConfigError::Read` if the file exists but cannot be read,
    /// `ConfigError::Parse` if it is not valid settings JSON
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Apply `LIBPROBE_*` overrides obtained through `lookup`
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` if `LIBPROBE_ADDRESS` is not a socket
    /// address
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LIBPROBE_ADDRESS") {
            self.server.address = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LIBPROBE_ADDRESS",
                value,
            })?;
        }
        if let Some(value) = lookup("LIBPROBE_CONNECTION_OLD") {
            self.connection_strings.old = value;
        }
        if let Some(value) = lookup("LIBPROBE_CONNECTION_NEW") {
            self.connection_strings.new = value;
        }
        if let Some(value) = lookup("LIBPROBE_ENV_CHECK") {
            self.env_check = Some(value);
        }
        Ok(())
    }

    /// Problems with the settings that do not prevent startup
    pub fn notices(&self) -> Vec<Notice> {
        DbKey::ALL
            .into_iter()
            .filter(|key| self.connection_strings.get(*key).is_empty())
            .map(|key| Notice::MissingConnectionString { key })
            .collect()
    }
}
