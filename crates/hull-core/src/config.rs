//! Configuration types for the hull server.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a working server on port 9034.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HullConfig {
    /// Listener and data path settings.
    pub server: ServerConfig,

    /// Area monitor settings.
    pub monitor: MonitorConfig,
}

impl HullConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// the same errors as [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "server.poll_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.server.read_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "server.read_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.server.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "server.max_line_length must be greater than zero".to_string(),
            ));
        }
        let threshold = self.monitor.area_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "monitor.area_threshold must be a non-negative number, got {}",
                threshold
            )));
        }
        Ok(())
    }
}

/// How client sockets are serviced once accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataPath {
    /// The reactor only accepts; each connection runs on its own thread
    /// with blocking reads.
    #[default]
    Proactor,

    /// Client sockets are registered with the reactor and serviced on its
    /// thread, one drain per readiness event.
    Reactor,
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proactor => f.write_str("proactor"),
            Self::Reactor => f.write_str("reactor"),
        }
    }
}

impl FromStr for DataPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "proactor" => Ok(Self::Proactor),
            "reactor" => Ok(Self::Reactor),
            other => Err(format!(
                "unknown data path '{}', expected 'proactor' or 'reactor'",
                other
            )),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listening socket to.
    pub bind_address: String,

    /// TCP port. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Connection servicing model.
    pub data_path: DataPath,

    /// Upper bound on a single reactor wait, in milliseconds.
    pub poll_timeout_ms: u64,

    /// Bytes requested per receive call.
    pub read_buffer_size: usize,

    /// Longest unterminated line a client may send before it is
    /// disconnected.
    pub max_line_length: usize,
}

impl ServerConfig {
    /// `bind_address:port` as a string suitable for `TcpListener::bind`.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Reactor wait bound as a [`Duration`].
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9034,
            data_path: DataPath::Proactor,
            poll_timeout_ms: 1000,
            read_buffer_size: 1024,
            max_line_length: 4096,
        }
    }
}

/// Area monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Run the background monitor at all.
    pub enabled: bool,

    /// Hull area at or above which the monitor reports "reached".
    pub area_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            area_threshold: 100.0,
        }
    }
}
