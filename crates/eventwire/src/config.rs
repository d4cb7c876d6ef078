//! Client configuration.

use std::time::Duration;

use crate::error::{EventwireError, Result};
use crate::logging::LogLevel;
use crate::transport::TransportOptions;

/// Environment variables read by [`ClientConfig::from_env`].
pub mod env {
    /// Event service hostname (required).
    pub const HOSTNAME: &str = "EVENTWIRE_HOSTNAME";
    /// Deployment stage, the first path segment of the endpoint (required).
    pub const STAGE: &str = "EVENTWIRE_STAGE";
    /// Value of the `Origin` handshake header.
    pub const ORIGIN: &str = "EVENTWIRE_ORIGIN";
    /// API key, sent as a bearer token.
    pub const API_KEY: &str = "EVENTWIRE_API_KEY";
    /// One of `none`, `errors`, `info`, `fine`.
    pub const LOG_LEVEL: &str = "EVENTWIRE_LOG_LEVEL";
    /// `true` or `false`; whether to reconnect after a lost connection.
    pub const RECONNECT: &str = "EVENTWIRE_RECONNECT";
    /// Whole seconds between connect attempts.
    pub const RETRY_DELAY_SECS: &str = "EVENTWIRE_RETRY_DELAY_SECS";
}

/// Default delay between failed connect attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Configuration for an [`EventClient`](crate::EventClient).
///
/// # Example
///
/// ```ignore
/// let config = ClientConfig::new("events.example.com", "prod")
///     .origin("https://app.example.com")
///     .api_key("k-123")
///     .log_level(LogLevel::Info);
///
/// assert_eq!(config.endpoint_url(), "wss://events.example.com/prod/api/events");
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Event service hostname, optionally with a port.
    pub hostname: String,
    /// Deployment stage.
    pub stage: String,
    /// Value of the `Origin` handshake header.
    pub origin: Option<String>,
    /// API key sent as `Authorization: Bearer <key>`.
    pub api_key: Option<String>,
    /// Use `wss://` (default) rather than `ws://`.
    pub secure: bool,
    /// Reconnect and resend outstanding exchanges after a lost connection.
    pub reconnect: bool,
    /// Fixed delay between failed connect attempts.
    pub retry_delay: Duration,
    /// Initial diagnostic log level.
    pub log_level: LogLevel,
    /// Options handed to the transport as-is.
    pub transport: TransportOptions,
}

impl ClientConfig {
    /// Create a configuration for `hostname` and `stage` with defaults.
    pub fn new(hostname: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            stage: stage.into(),
            origin: None,
            api_key: None,
            secure: true,
            reconnect: true,
            retry_delay: DEFAULT_RETRY_DELAY,
            log_level: LogLevel::default(),
            transport: TransportOptions::default(),
        }
    }

    /// Set the `Origin` header.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Connect with plain `ws://`. Intended for local servers.
    pub fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    /// Enable or disable reconnection after a lost connection.
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Set the delay between failed connect attempts.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the initial log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the transport options.
    pub fn transport(mut self, options: TransportOptions) -> Self {
        self.transport = options;
        self
    }

    /// The event endpoint: `wss://<hostname>/<stage>/api/events`.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!(
            "{scheme}://{}/{}/api/events",
            self.hostname.trim_end_matches('/'),
            self.stage.trim_matches('/')
        )
    }

    /// Headers the client itself adds to the handshake.
    pub fn handshake_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(origin) = &self.origin {
            headers.push(("Origin".to_string(), origin.clone()));
        }
        if let Some(api_key) = &self.api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {api_key}")));
        }
        headers
    }

    /// Check that the endpoint parameters are present and form a valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(EventwireError::Config("hostname is required".into()));
        }
        if self.stage.trim_matches('/').trim().is_empty() {
            return Err(EventwireError::Config("stage is required".into()));
        }
        url::Url::parse(&self.endpoint_url())?;
        Ok(())
    }

    /// Load a configuration from the process environment.
    ///
    /// See [`env`] for the variable names.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load a configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| EventwireError::Config(format!("{name} is not set")))
        };

        let mut config = Self::new(required(env::HOSTNAME)?, required(env::STAGE)?);
        config.origin = lookup(env::ORIGIN);
        config.api_key = lookup(env::API_KEY);

        if let Some(level) = lookup(env::LOG_LEVEL) {
            config.log_level = level.parse()?;
        }
        if let Some(reconnect) = lookup(env::RECONNECT) {
            config.reconnect = reconnect.trim().parse().map_err(|_| {
                EventwireError::Config(format!("{} must be true or false", env::RECONNECT))
            })?;
        }
        if let Some(secs) = lookup(env::RETRY_DELAY_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                EventwireError::Config(format!(
                    "{} must be a whole number of seconds",
                    env::RETRY_DELAY_SECS
                ))
            })?;
            config.retry_delay = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }
}
