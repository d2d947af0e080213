//! Client configuration.
//!
//! Values resolve in this order (later wins):
//!
//! 1. Built-in defaults ([`ClientConfig::default`])
//! 2. Environment variables ([`ClientConfig::from_env`])
//! 3. Explicit `with_*` overrides (the CLI flags)

use std::time::Duration;

use thiserror::Error;

use crate::rpc::DEFAULT_MAX_FRAME_SIZE;

/// Default device address on a fresh install.
pub const DEFAULT_HOST: &str = "192.168.1.20";

/// TCP port the firmware's RPC server listens on.
pub const DEFAULT_PORT: u16 = 1022;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// How long to wait for the device to close its side after we half-close.
pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 1_000;

pub const ENV_HOST: &str = "DOSER_HOST";
pub const ENV_PORT: &str = "DOSER_PORT";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "DOSER_CONNECT_TIMEOUT_MS";
pub const ENV_READ_TIMEOUT_MS: &str = "DOSER_READ_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the device lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Device host name or IP address.
    pub host: String,
    /// Device RPC port.
    pub port: u16,
    /// Upper bound on establishing each TCP connection.
    pub connect_timeout: Duration,
    /// Idle-read timeout while awaiting a response frame. `None` waits
    /// indefinitely.
    pub read_timeout: Option<Duration>,
    /// Largest response frame accepted, in bytes.
    pub max_frame_size: usize,
    /// How long to wait for the device to close after we half-close.
    pub close_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            close_timeout: Duration::from_millis(DEFAULT_CLOSE_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// Default timeouts for the device at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `DOSER_*` environment variables.
    ///
    /// A read timeout of `0` disables the idle-read timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup, so
    /// tests never touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_HOST) {
            let host = host.trim();
            if host.is_empty() {
                return Err(invalid(ENV_HOST, host, "host must not be empty"));
            }
            config.host = host.to_string();
        }

        if let Some(port) = lookup(ENV_PORT) {
            config.port = port
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| invalid(ENV_PORT, &port, e))?;
        }

        if let Some(ms) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            let ms = parse_millis(ENV_CONNECT_TIMEOUT_MS, &ms)?;
            if ms == 0 {
                return Err(invalid(ENV_CONNECT_TIMEOUT_MS, "0", "must be positive"));
            }
            config.connect_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = lookup(ENV_READ_TIMEOUT_MS) {
            let ms = parse_millis(ENV_READ_TIMEOUT_MS, &ms)?;
            config.read_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// `host:port`, as used in logs and errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(var, value, e))
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
