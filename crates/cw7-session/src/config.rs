//! Session configuration file support.
//!
//! Loads and validates device connection settings from TOML files.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use cw7_common::{NcError, NcResult};

use crate::transport::ConnectParams;

/// Connection settings for one device.
#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// NETCONF-over-SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Per-RPC timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub hostkey_verify: bool,

    #[serde(default)]
    pub allow_agent: bool,

    #[serde(default)]
    pub look_for_keys: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by `CW7_LOG`
    #[serde(default = "default_level")]
    pub level: String,

    /// Include the event target in each line
    #[serde(default = "default_with_target")]
    pub with_target: bool,
}

/// Complete session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    830
}

fn default_timeout() -> u64 {
    30
}

fn default_level() -> String {
    "info".to_string()
}

fn default_with_target() -> bool {
    true
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout(),
            hostkey_verify: false,
            allow_agent: false,
            look_for_keys: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            with_target: default_with_target(),
        }
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("hostkey_verify", &self.hostkey_verify)
            .field("allow_agent", &self.allow_agent)
            .field("look_for_keys", &self.look_for_keys)
            .finish()
    }
}

impl DeviceConfig {
    /// Creates a config for `host` with default port and timeout.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Sets the per-RPC timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Get per-RPC timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parameters for one connect attempt; the flags override the file.
    pub fn connect_params(
        &self,
        hostkey_verify: bool,
        allow_agent: bool,
        look_for_keys: bool,
    ) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: self.timeout(),
            hostkey_verify,
            allow_agent,
            look_for_keys,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> NcResult<()> {
        if self.host.trim().is_empty() {
            return Err(NcError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(NcError::config("port must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(NcError::config("timeout_secs must be > 0"));
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> NcResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                NcError::config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(NcError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> NcResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| NcError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content).map_err(|e| {
            NcError::config(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> NcResult<()> {
        self.device.validate()?;
        if self.logging.level.trim().is_empty() {
            return Err(NcError::config("logging level must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw7_common::ErrorKind;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.device.host, "127.0.0.1");
        assert_eq!(config.device.port, 830);
        assert_eq!(config.device.timeout(), Duration::from_secs(30));
        assert!(!config.device.hostkey_verify);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.with_target);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SessionConfig::default();
        config.device.port = 0;
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Config);

        let mut config = SessionConfig::default();
        config.device.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.device.host = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let device = DeviceConfig::new("sw1", "admin", "hunter2");
        let debug = format!("{:?}", device);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("sw1"));
    }

    #[test]
    fn test_connect_params_use_flags() {
        let device = DeviceConfig::new("sw1", "admin", "pw").with_timeout(Duration::from_secs(5));
        let params = device.connect_params(true, false, true);
        assert_eq!(params.host, "sw1");
        assert_eq!(params.port, 830);
        assert_eq!(params.timeout, Duration::from_secs(5));
        assert!(params.hostkey_verify);
        assert!(!params.allow_agent);
        assert!(params.look_for_keys);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[device]
host = "10.10.10.1"
username = "netconf"
timeout_secs = 60
"#;
        let config: SessionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.host, "10.10.10.1");
        assert_eq!(config.device.timeout_secs, 60);
        // Unspecified values should use defaults
        assert_eq!(config.device.port, 830);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cw7.toml");

        let mut config = SessionConfig::default();
        config.device.host = "sw-core-1".into();
        config.logging.level = "debug".into();
        config.save(&path).unwrap();

        let loaded = SessionConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.device.host, "sw-core-1");
        assert_eq!(loaded.logging.level, "debug");
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = SessionConfig::load_or_default("/nonexistent/cw7.toml").unwrap();
        assert_eq!(config.device.host, "127.0.0.1");
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[device\nhost = ").unwrap();
        let err = SessionConfig::load_or_default(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
