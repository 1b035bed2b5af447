//! Connection coordinates for a remote store.

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port
pub const DEFAULT_PORT: u16 = 6379;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the store lives and how long to wait for it.
///
/// One factory is created per config and keeps it for its whole life; there is
/// no reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Reads `KVOPS_HOST` and `KVOPS_PORT`, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(host) = env::var("KVOPS_HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("KVOPS_PORT") {
            config.port = parse_port(&port)?;
        }
        Ok(config)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port`, as passed to the socket connect.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be between 1 and 65535".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::Config("connect timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Parses a port number from text.
pub fn parse_port(value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Config(format!("invalid port: {value}"))),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:6379");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_setters() {
        let config = ConnectionConfig::default()
            .host("localhost")
            .port(7000)
            .connect_timeout(Duration::from_millis(250));
        assert_eq!(config.addr(), "localhost:7000");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_missing_coordinates() {
        assert!(matches!(
            ConnectionConfig::new("", 6379).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConnectionConfig::new("localhost", 0).validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_env() {
        // the only test touching these variables
        env::set_var("KVOPS_HOST", "store.internal");
        env::set_var("KVOPS_PORT", "6380");
        let config = ConnectionConfig::from_env().unwrap();
        assert_eq!(config.addr(), "store.internal:6380");

        env::set_var("KVOPS_PORT", "not-a-port");
        assert!(matches!(ConnectionConfig::from_env(), Err(Error::Config(_))));

        env::remove_var("KVOPS_HOST");
        env::remove_var("KVOPS_PORT");
        assert_eq!(ConnectionConfig::from_env().unwrap(), ConnectionConfig::default());
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("6380").unwrap(), 6380);
        assert!(parse_port("0").is_err());
        assert!(parse_port("redis").is_err());
        assert!(parse_port("70000").is_err());
    }
}
