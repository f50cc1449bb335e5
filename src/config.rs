//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via --config or CHARDB_CONFIG)
//! 3. Environment variables
//! 4. Command-line flags (applied by the caller)

use chardb_client::ConnectionConfig;
use chardb_protocol::{Layout, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CHARDB_CONFIG";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Record layout spoken by the server.
    pub layout: Layout,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds; 0 waits indefinitely.
    pub request_timeout_ms: u64,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            layout: Layout::default(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            read_buffer_size: 8 * 1024,
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or `CHARDB_CONFIG`), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies overrides from variables looked up through `var`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("CHARDB_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }

        if let Some(port) = var("CHARDB_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("Ignoring invalid CHARDB_PORT '{}'", port),
            }
        }

        if let Some(layout) = var("CHARDB_LAYOUT") {
            match layout.parse() {
                Ok(layout) => self.layout = layout,
                Err(e) => tracing::warn!("Ignoring CHARDB_LAYOUT: {}", e),
            }
        }

        if let Some(timeout) = var("CHARDB_CONNECT_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.connect_timeout_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid CHARDB_CONNECT_TIMEOUT_MS '{}'", timeout),
            }
        }
    }

    /// Builds the connection configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        let request_timeout = match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        ConnectionConfig::new()
            .with_port(self.port)
            .with_layout(self.layout)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_request_timeout(request_timeout)
            .with_read_buffer_size(self.read_buffer_size)
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 12345);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.layout, Layout::Portrait);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: db.example.net\nlayout: classic").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.host, "db.example.net");
        assert_eq!(config.layout, Layout::Classic);
        // Unspecified fields keep their defaults
        assert_eq!(config.port, 12345);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "port: not-a-number\n").unwrap();
        let err = Config::from_file(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CHARDB_HOST", "10.0.2.5"),
            ("CHARDB_PORT", "4000"),
            ("CHARDB_LAYOUT", "classic"),
            ("CHARDB_CONNECT_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.host, "10.0.2.5");
        assert_eq!(config.port, 4000);
        assert_eq!(config.layout, Layout::Classic);
        assert_eq!(config.connect_timeout_ms, 250);
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "CHARDB_PORT" => Some("70000".to_string()),
            "CHARDB_LAYOUT" => Some("round".to_string()),
            _ => None,
        });
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_connection_config() {
        let config = Config {
            port: 4000,
            layout: Layout::Classic,
            request_timeout_ms: 0,
            ..Config::default()
        };
        let conn = config.connection_config();
        assert_eq!(conn.port, 4000);
        assert_eq!(conn.layout, Layout::Classic);
        assert_eq!(conn.request_timeout, None);
        assert_eq!(conn.connect_timeout, Duration::from_millis(10_000));
    }
}
