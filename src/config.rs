//! # Configuration Management
//!
//! Centralized configuration for a host system connection.
//!
//! A [`HostConfig`] names the target host and the credentials used to sign on,
//! plus connection and logging settings.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - `HOSTSERVER_*` environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - The password is never serialized and is redacted from `Debug` output
//! - Plain sockets are the default; set `use_tls` for encrypted service ports

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Well-known port of the port mapper service
pub const DEFAULT_PORT_MAPPER_PORT: u16 = 449;

/// Max allowed packet size (e.g. 16 MB)
pub const MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// Longest user id or password the host accepts, in characters
pub const MAX_CREDENTIAL_CHARS: usize = 10;

/// Main configuration structure that contains all configurable settings
#[derive(Clone, Deserialize, Serialize, Default)]
pub struct HostConfig {
    /// Host name or address of the remote system
    #[serde(default)]
    pub host: String,

    /// User profile to sign on as
    #[serde(default)]
    pub user: String,

    /// Password for `user`
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connection", &self.connection)
            .field("logging", &self.logging)
            .finish()
    }
}

impl HostConfig {
    /// Configuration for `host` with the given credentials and default settings
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("HOSTSERVER_HOST") {
            config.host = host;
        }
        if let Ok(user) = std::env::var("HOSTSERVER_USER") {
            config.user = user;
        }
        if let Ok(password) = std::env::var("HOSTSERVER_PASSWORD") {
            config.password = password;
        }

        if let Ok(port) = std::env::var("HOSTSERVER_PORT_MAPPER_PORT") {
            config.connection.port_mapper_port = port.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid HOSTSERVER_PORT_MAPPER_PORT: {e}"))
            })?;
        }

        if let Ok(val) = std::env::var("HOSTSERVER_USE_TLS") {
            config.connection.use_tls = parse_flag("HOSTSERVER_USE_TLS", &val)?;
        }

        if let Ok(val) = std::env::var("HOSTSERVER_ACCEPT_INVALID_CERTS") {
            config.connection.accept_invalid_certs =
                parse_flag("HOSTSERVER_ACCEPT_INVALID_CERTS", &val)?;
        }

        if let Ok(val) = std::env::var("HOSTSERVER_USE_DEFAULT_PORTS") {
            config.connection.use_default_ports = parse_flag("HOSTSERVER_USE_DEFAULT_PORTS", &val)?;
        }

        if let Ok(timeout) = std::env::var("HOSTSERVER_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.connection.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(level) = std::env::var("HOSTSERVER_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid HOSTSERVER_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("Host name cannot be empty".to_string());
        }

        if self.user.trim().is_empty() {
            errors.push("User ID cannot be empty".to_string());
        } else if self.user.chars().count() > MAX_CREDENTIAL_CHARS {
            errors.push(format!(
                "User ID too long: {} characters (maximum: {MAX_CREDENTIAL_CHARS})",
                self.user.chars().count()
            ));
        }

        if self.password.is_empty() {
            errors.push("Password cannot be empty".to_string());
        }

        errors.extend(self.connection.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ProtocolError::ConfigError(format!(
            "Invalid {name}: {other} (expected true or false)"
        ))),
    }
}

/// How service sockets are located and opened
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Port of the port mapper service
    pub port_mapper_port: u16,

    /// Skip the port mapper and use each service's well-known port
    pub use_default_ports: bool,

    /// Open service sockets over TLS
    pub use_tls: bool,

    /// Skip certificate verification on TLS sockets (test hosts only)
    pub accept_invalid_certs: bool,

    /// Deadline for establishing each TCP connection
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Largest frame accepted from the host
    pub max_packet_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_mapper_port: DEFAULT_PORT_MAPPER_PORT,
            use_default_ports: false,
            use_tls: false,
            accept_invalid_certs: false,
            connect_timeout: timeout::DEFAULT_CONNECT_TIMEOUT,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Validate connection configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port_mapper_port == 0 && !self.use_default_ports {
            errors.push("Port mapper port cannot be 0".to_string());
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.accept_invalid_certs && !self.use_tls {
            errors.push("accept_invalid_certs has no effect without use_tls".to_string());
        }

        if self.max_packet_size < 1024 {
            errors.push("Max packet size too small (minimum: 1 KB)".to_string());
        } else if self.max_packet_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max packet size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_packet_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("hostserver-protocol"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
