//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::dispatcher::BusyPolicy;
use crate::error::{Result, WebhookError};
use crate::webhook::{MatchPolarity, SessionSettings, SuccessPolicy, WebhookCredentials};

/// Baud rates accepted for the modem port
const VALID_BAUD_RATES: [u32; 9] = [
    9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600, 1000000,
];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub modem: ModemConfig,
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Modem serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ModemConfig {
    #[serde(default = "default_modem_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

/// Webhook destination configuration
#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    pub event: String,

    pub key: String,

    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    #[serde(default = "default_success_line")]
    pub success_line: String,

    #[serde(default)]
    pub success_polarity: MatchPolarity,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

/// Activation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TriggerConfig {
    /// Seconds between periodic activations; 0 disables them
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,

    #[serde(default)]
    pub busy_policy: BusyPolicy,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty logs to stderr only
    #[serde(default)]
    pub log_dir: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            interval_s: default_interval_s(),
            busy_policy: BusyPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("event", &self.event)
            .field("key", &"<redacted>")
            .field("recv_buffer_size", &self.recv_buffer_size)
            .field("success_line", &self.success_line)
            .field("success_polarity", &self.success_polarity)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("io_timeout_ms", &self.io_timeout_ms)
            .finish()
    }
}

// Default value functions
fn default_modem_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_command_timeout_ms() -> u64 { 2000 }

fn default_host() -> String { "maker.ifttt.com".to_string() }
fn default_http_port() -> u16 { 80 }
fn default_recv_buffer_size() -> usize { 1024 }
fn default_success_line() -> String { "HTTP/1.1 200 OK".to_string() }
fn default_connect_timeout_ms() -> u64 { 10000 }
fn default_io_timeout_ms() -> u64 { 10000 }

fn default_interval_s() -> u64 { 300 }

fn default_log_level() -> String { "info".to_string() }

impl WebhookConfig {
    pub fn credentials(&self) -> WebhookCredentials {
        WebhookCredentials {
            event: self.event.clone(),
            key: self.key.clone(),
        }
    }

    pub fn success_policy(&self) -> SuccessPolicy {
        SuccessPolicy::new(self.success_line.clone(), self.success_polarity)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            host: self.host.clone(),
            port: self.port,
            recv_buffer_size: self.recv_buffer_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            policy: self.success_policy(),
        }
    }
}

impl TriggerConfig {
    /// Periodic activation interval, `None` when disabled
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_s > 0).then(|| Duration::from_secs(self.interval_s))
    }
}

fn invalid(message: impl std::fmt::Display) -> WebhookError {
    WebhookError::Config(toml::de::Error::custom(message))
}

/// Event and key end up in the request path
fn validate_path_segment(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(format!("webhook {} cannot be empty", name)));
    }

    if let Some(c) = value
        .chars()
        .find(|c| !c.is_ascii_graphic() || matches!(c, '/' | '?' | '#'))
    {
        return Err(invalid(format!(
            "webhook {} contains invalid character {:?}",
            name, c
        )));
    }

    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use modem_webhook::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Modem
        if self.modem.port.is_empty() {
            return Err(invalid("modem port cannot be empty"));
        }

        if !VALID_BAUD_RATES.contains(&self.modem.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                VALID_BAUD_RATES
            )));
        }

        if self.modem.command_timeout_ms == 0 || self.modem.command_timeout_ms > 60000 {
            return Err(invalid("command_timeout_ms must be between 1 and 60000"));
        }

        // Webhook destination
        if self.webhook.host.is_empty() {
            return Err(invalid("webhook host cannot be empty"));
        }

        if self
            .webhook
            .host
            .chars()
            .any(|c| c.is_whitespace() || c == '/')
        {
            return Err(invalid("webhook host cannot contain whitespace or '/'"));
        }

        if self.webhook.port == 0 {
            return Err(invalid("webhook port must be greater than 0"));
        }

        validate_path_segment("event", &self.webhook.event)?;
        validate_path_segment("key", &self.webhook.key)?;

        // Transport limits
        if self.webhook.recv_buffer_size < 64 || self.webhook.recv_buffer_size > 65536 {
            return Err(invalid("recv_buffer_size must be between 64 and 65536"));
        }

        if self.webhook.success_line.is_empty() {
            return Err(invalid("success_line cannot be empty"));
        }

        if self.webhook.connect_timeout_ms == 0 || self.webhook.connect_timeout_ms > 120000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 120000"));
        }

        if self.webhook.io_timeout_ms == 0 || self.webhook.io_timeout_ms > 120000 {
            return Err(invalid("io_timeout_ms must be between 1 and 120000"));
        }

        // Logging
        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }
}
