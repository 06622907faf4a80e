//! Configuration management for the hub
//!
//! Configuration comes from defaults, a TOML file, `XHUB_*` environment
//! variables, or the builder, and is overridden by command-line flags.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::topology::LivenessThresholds;

const DEFAULT_HTTP_BIND: &str = "0.0.0.0:51700";
const DEFAULT_UDP_BIND: &str = "0.0.0.0:51701";

/// Hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Operator HTTP API bind address
    pub http_bind: SocketAddr,

    /// UDP control-plane bind address
    pub udp_bind: SocketAddr,

    /// UDP port node agents listen on for commands
    pub node_command_port: u16,

    /// Directory of uploaded module assets
    pub files_dir: PathBuf,

    /// Crash-recovery snapshot file
    pub snapshot_path: PathBuf,

    /// Descriptions store file name inside `files_dir`
    pub descriptions_file: String,

    /// Seconds of silence before an entity is marked Warning
    pub warning_after_secs: u64,

    /// Seconds of silence before an entity is marked Danger
    pub danger_after_secs: u64,

    /// Deadline for one outbound node command
    pub send_timeout_secs: u64,

    /// Enable CORS for the API
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,

    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            http_bind: default_addr(DEFAULT_HTTP_BIND, 51700),
            udp_bind: default_addr(DEFAULT_UDP_BIND, 51701),
            node_command_port: 51710,
            files_dir: PathBuf::from("files"),
            snapshot_path: PathBuf::from("xht_autobackup.txt"),
            descriptions_file: String::from("xhub_descriptions.json"),
            warning_after_secs: 15,
            danger_after_secs: 30,
            send_timeout_secs: 3,
            enable_cors: false,
            enable_request_logging: true,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_addr(addr: &str, port: u16) -> SocketAddr {
    addr.parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}

impl HubConfig {
    /// Create a new config builder
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }

    /// Defaults overridden by `XHUB_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = env_parse("XHUB_HTTP_BIND")? {
            config.http_bind = addr;
        }
        if let Some(addr) = env_parse("XHUB_UDP_BIND")? {
            config.udp_bind = addr;
        }
        if let Some(port) = env_parse("XHUB_NODE_COMMAND_PORT")? {
            config.node_command_port = port;
        }
        if let Ok(dir) = std::env::var("XHUB_FILES_DIR") {
            config.files_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("XHUB_SNAPSHOT_PATH") {
            config.snapshot_path = PathBuf::from(path);
        }
        if let Ok(name) = std::env::var("XHUB_DESCRIPTIONS_FILE") {
            config.descriptions_file = name;
        }
        if let Some(secs) = env_parse("XHUB_WARNING_AFTER_SECS")? {
            config.warning_after_secs = secs;
        }
        if let Some(secs) = env_parse("XHUB_DANGER_AFTER_SECS")? {
            config.danger_after_secs = secs;
        }
        if let Some(secs) = env_parse("XHUB_SEND_TIMEOUT_SECS")? {
            config.send_timeout_secs = secs;
        }
        if let Some(enable) = env_parse("XHUB_ENABLE_CORS")? {
            config.enable_cors = enable;
        }
        if let Some(enable) = env_parse("XHUB_ENABLE_REQUEST_LOGGING")? {
            config.enable_request_logging = enable;
        }
        if let Ok(level) = std::env::var("XHUB_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("XHUB_LOG_FORMAT") {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warning_after_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "warning_after_secs".to_string(),
                reason: "Must be at least 1 second".to_string(),
            });
        }

        if self.danger_after_secs <= self.warning_after_secs {
            return Err(ConfigError::InvalidValue {
                field: "danger_after_secs".to_string(),
                reason: "Must be greater than warning_after_secs".to_string(),
            });
        }

        if self.send_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "send_timeout_secs".to_string(),
                reason: "Must be at least 1 second".to_string(),
            });
        }

        if self.node_command_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "node_command_port".to_string(),
                reason: "Port 0 cannot be addressed".to_string(),
            });
        }

        let plain = Path::new(&self.descriptions_file)
            .file_name()
            .and_then(|n| n.to_str())
            == Some(self.descriptions_file.as_str());
        if !plain {
            return Err(ConfigError::InvalidValue {
                field: "descriptions_file".to_string(),
                reason: format!("Not a plain file name: {}", self.descriptions_file),
            });
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason: format!("Expected 'text' or 'json', got '{}'", self.logging.format),
            });
        }

        Ok(())
    }

    /// Full path of the descriptions store
    pub fn descriptions_path(&self) -> PathBuf {
        self.files_dir.join(&self.descriptions_file)
    }

    pub fn thresholds(&self) -> LivenessThresholds {
        LivenessThresholds {
            warning_after_secs: i64::try_from(self.warning_after_secs).unwrap_or(i64::MAX),
            danger_after_secs: i64::try_from(self.danger_after_secs).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                reason: format!("Cannot parse '{raw}'"),
            }),
        Err(_) => Ok(None),
    }
}

/// Builder for HubConfig
#[derive(Debug, Default)]
pub struct HubConfigBuilder {
    http_bind: Option<SocketAddr>,
    udp_bind: Option<SocketAddr>,
    node_command_port: Option<u16>,
    files_dir: Option<PathBuf>,
    snapshot_path: Option<PathBuf>,
    warning_after_secs: Option<u64>,
    danger_after_secs: Option<u64>,
    send_timeout_secs: Option<u64>,
    enable_cors: Option<bool>,
    enable_request_logging: Option<bool>,
}

impl HubConfigBuilder {
    pub fn http_bind(mut self, addr: SocketAddr) -> Self {
        self.http_bind = Some(addr);
        self
    }

    /// Set HTTP bind address from string
    pub fn http_bind_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.http_bind = Some(parse_addr("http_bind", addr)?);
        Ok(self)
    }

    pub fn udp_bind(mut self, addr: SocketAddr) -> Self {
        self.udp_bind = Some(addr);
        self
    }

    /// Set UDP bind address from string
    pub fn udp_bind_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.udp_bind = Some(parse_addr("udp_bind", addr)?);
        Ok(self)
    }

    pub fn node_command_port(mut self, port: u16) -> Self {
        self.node_command_port = Some(port);
        self
    }

    pub fn files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.files_dir = Some(dir.into());
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn warning_after_secs(mut self, secs: u64) -> Self {
        self.warning_after_secs = Some(secs);
        self
    }

    pub fn danger_after_secs(mut self, secs: u64) -> Self {
        self.danger_after_secs = Some(secs);
        self
    }

    pub fn send_timeout_secs(mut self, secs: u64) -> Self {
        self.send_timeout_secs = Some(secs);
        self
    }

    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.enable_cors = Some(enable);
        self
    }

    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<HubConfig, ConfigError> {
        let defaults = HubConfig::default();
        let config = HubConfig {
            http_bind: self.http_bind.unwrap_or(defaults.http_bind),
            udp_bind: self.udp_bind.unwrap_or(defaults.udp_bind),
            node_command_port: self.node_command_port.unwrap_or(defaults.node_command_port),
            files_dir: self.files_dir.unwrap_or(defaults.files_dir),
            snapshot_path: self.snapshot_path.unwrap_or(defaults.snapshot_path),
            descriptions_file: defaults.descriptions_file,
            warning_after_secs: self.warning_after_secs.unwrap_or(defaults.warning_after_secs),
            danger_after_secs: self.danger_after_secs.unwrap_or(defaults.danger_after_secs),
            send_timeout_secs: self.send_timeout_secs.unwrap_or(defaults.send_timeout_secs),
            enable_cors: self.enable_cors.unwrap_or(defaults.enable_cors),
            enable_request_logging: self
                .enable_request_logging
                .unwrap_or(defaults.enable_request_logging),
            logging: defaults.logging,
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_addr(field: &str, addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("Invalid address: {}", addr),
    })
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { field: String, reason: String },
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            Self::Io { path, message } => {
                write!(f, "Failed to read config file {}: {}", path.display(), message)
            }
            Self::Parse { path, message } => {
                write!(f, "Failed to parse config file {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
