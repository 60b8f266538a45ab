use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use super::session::RetryPolicy;
use crate::tftp::core::Mode;

/// TFTP client configuration
///
/// Values come from the defaults, then an optional TOML file, then the
/// command line.
///
/// # Example
///
/// ```rust
/// use tftpc::tftp::client::ClientConfig;
///
/// let config = ClientConfig::new("192.168.1.100", 69);
/// ```
///
/// A configuration file only needs the keys it changes:
///
/// ```toml
/// server_port = 6969
/// mode = "octet"
/// timeout = "2s 500ms"
/// retries = 8
/// backoff = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Server host name or IP address
    pub server_host: String,
    /// Server port number
    pub server_port: u16,
    /// Transfer mode named in the request
    pub mode: Mode,
    /// Timeout for each reply
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Retransmissions before a transfer fails
    pub retries: u32,
    /// Timeout multiplier applied after each retransmission
    pub backoff: f32,
}

impl ClientConfig {
    /// Create new client configuration
    ///
    /// # Arguments
    ///
    /// * `server_host` - Server host name or IP address
    /// * `server_port` - Server port number (usually 69)
    pub fn new(server_host: impl Into<String>, server_port: u16) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            mode: Mode::Netascii,
            timeout: Duration::from_secs(5),
            retries: 5,
            backoff: 1.0,
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Apply command-line values on top of this configuration
    pub fn merge_cli(
        mut self,
        server_host: String,
        server_port: Option<u16>,
        mode: Option<Mode>,
        timeout: Option<Duration>,
        retries: Option<u32>,
    ) -> Self {
        self.server_host = server_host;
        if let Some(port) = server_port {
            self.server_port = port;
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        if let Some(retries) = retries {
            self.retries = retries;
        }
        self
    }

    /// Set timeout duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retransmissions
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set transfer mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.timeout, self.retries).with_backoff(self.backoff)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 69)
    }
}
