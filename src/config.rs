//! Type-Safe Configuration with Validation
//!
//! Settings come from environment variables (optionally a `.env` file) and are
//! validated once at startup.

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid URL format or scheme
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    /// A timeout that must be positive was zero
    #[error("Invalid timeout for {field}: must be greater than 0")]
    InvalidTimeout { field: String },

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError { name: String, reason: String },
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address of the OAuth gRPC service
    pub service_url: Url,
    /// Deadline applied to every unary call
    pub request_timeout: Duration,
    /// Deadline for establishing the connection
    pub connect_timeout: Duration,
    /// Deadline for the whole Authenticate stream; `None` waits indefinitely
    pub handshake_timeout: Option<Duration>,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: Url::parse("http://localhost:50051").expect("valid default URL"),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Some(Duration::from_secs(300)),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable cannot be parsed or a value is
    /// out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let handshake_secs: u64 = parse_env("HANDSHAKE_TIMEOUT", 300)?;

        let config = Self {
            service_url: parse_url_env("OAUTH_SERVICE_URL", "http://localhost:50051")?,
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT", 30)?),
            connect_timeout: Duration::from_secs(parse_env("CONNECT_TIMEOUT", 5)?),
            handshake_timeout: (handshake_secs > 0).then(|| Duration::from_secs(handshake_secs)),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_env("LOG_JSON", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the service URL scheme is not http or https
    /// - the request or connect timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme = self.service_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::InvalidUrl {
                field: "OAUTH_SERVICE_URL".to_string(),
                reason: format!("scheme '{scheme}' must be http or https"),
            });
        }
        if self.service_url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                field: "OAUTH_SERVICE_URL".to_string(),
                reason: "missing host".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                field: "REQUEST_TIMEOUT".to_string(),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                field: "CONNECT_TIMEOUT".to_string(),
            });
        }
        Ok(())
    }

    /// Creates a config pointing at the given service URL.
    #[must_use]
    pub fn with_service_url(mut self, url: Url) -> Self {
        self.service_url = url;
        self
    }

    /// Creates a config with the given unary call timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Creates a config with the given handshake deadline.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Gets the service URL as a string.
    #[must_use]
    pub fn service_url_str(&self) -> &str {
        self.service_url.as_str()
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a URL environment variable with a default value.
fn parse_url_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let url_str = env::var(name).unwrap_or_else(|_| default.to_string());
    Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}
