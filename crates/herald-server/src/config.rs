//! Server configuration.
//!
//! Configuration can be loaded from:
//! - `HERALD_CONFIG`, naming a TOML file explicitly
//! - The first existing default path (`herald.toml`, `/etc/herald/herald.toml`,
//!   `~/.config/herald/herald.toml`)
//! - Built-in defaults
//!
//! `HERALD_HOST` and `HERALD_PORT` override whatever the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

const CONFIG_PATHS: [&str; 3] = [
    "herald.toml",
    "/etc/herald/herald.toml",
    "~/.config/herald/herald.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Simulated robot producer.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Enable the SSE push endpoint.
    #[serde(default = "default_true")]
    pub push: bool,

    /// Path for the push endpoint.
    #[serde(default = "default_push_path")]
    pub push_path: String,

    /// Enable the WebSocket endpoint.
    #[serde(default = "default_true")]
    pub websocket: bool,

    /// Path for the WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Allow cross-origin requests.
    #[serde(default = "default_true")]
    pub cors: bool,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of registered connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Events buffered per connection before the oldest is displaced.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Idle time after which a heartbeat is sent, in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// How long a delivery task waits on an empty mailbox before checking
    /// its transport, in milliseconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Demo producer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Publish the scripted robot responses after startup.
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

fn default_push_path() -> String {
    "/api/events".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_mailbox_capacity() -> usize {
    herald_core::mailbox::DEFAULT_MAILBOX_CAPACITY
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_heartbeat_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_idle_timeout() -> u64 {
    30_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            push: true,
            push_path: default_push_path(),
            websocket: true,
            websocket_path: default_ws_path(),
            cors: true,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            mailbox_capacity: default_mailbox_capacity(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            idle_timeout_ms: default_idle_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl HeartbeatConfig {
    /// Heartbeat interval as a duration.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Delivery idle timeout as a duration. Zero falls back to the default.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        if self.idle_timeout_ms == 0 {
            herald_transport::delivery::DEFAULT_IDLE_TIMEOUT
        } else {
            Duration::from_millis(self.idle_timeout_ms)
        }
    }
}

impl Config {
    /// Load configuration from file or defaults, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// `HERALD_PORT` is not a valid port.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("HERALD_CONFIG") {
            Ok(path) => Self::from_file(shellexpand::tilde(&path).as_ref())?,
            Err(_) => Self::from_default_paths()?,
        };

        config.apply_overrides(
            std::env::var("HERALD_HOST").ok(),
            std::env::var("HERALD_PORT").ok(),
        )?;
        Ok(config)
    }

    fn from_default_paths() -> Result<Self> {
        for path in &CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn apply_overrides(&mut self, host: Option<String>, port: Option<String>) -> Result<()> {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid HERALD_PORT: {}", port))?;
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert!(config.transport.push);
        assert!(config.transport.websocket);
        assert_eq!(config.transport.push_path, "/api/events");
        assert_eq!(config.limits.mailbox_capacity, 64);
        assert_eq!(config.heartbeat.interval(), Duration::from_secs(30));
        assert!(!config.demo.enabled);
    }

    #[test]
    fn test_config_bind_addr() {
        let config = Config::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 8000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_invalid_bind_addr() {
        let config = Config {
            host: "not a host".into(),
            ..Config::default()
        };
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [limits]
            max_connections = 500
            mailbox_capacity = 16

            [heartbeat]
            interval_ms = 5000

            [demo]
            enabled = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.limits.max_connections, 500);
        assert_eq!(config.limits.mailbox_capacity, 16);
        assert_eq!(config.limits.max_message_size, 64 * 1024);
        assert_eq!(config.heartbeat.interval(), Duration::from_secs(5));
        assert_eq!(config.heartbeat.idle_timeout(), Duration::from_secs(30));
        assert!(config.demo.enabled);
        assert!(config.transport.cors);
    }

    #[test]
    fn test_zero_idle_timeout_falls_back() {
        let config: Config = toml::from_str(
            r#"
            [heartbeat]
            idle_timeout_ms = 0
        "#,
        )
        .unwrap();
        assert_eq!(config.heartbeat.idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(Some("0.0.0.0".into()), Some("8080".into()))
            .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);

        assert!(config.apply_overrides(None, Some("eighty".into())).is_err());
    }

    #[test]
    fn test_from_missing_file() {
        assert!(Config::from_file("/nonexistent/herald.toml").is_err());
    }
}
