//! Log output for the client binary.
//!
//! `RUST_LOG`, when set and non-empty, replaces `LOG_LEVEL` entirely.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Environment variable whose directives override the configured level.
pub const FILTER_ENV: &str = "RUST_LOG";

/// Line format of the console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event, with the current span (and its `run_id`)
    Json,
}

/// Logging setup failures.
#[derive(Error, Debug)]
pub enum LogInitError {
    /// Filter directives could not be parsed
    #[error("invalid log filter '{directives}': {source}")]
    InvalidFilter {
        /// Directives as given
        directives: String,
        /// Parser detail
        #[source]
        source: ParseError,
    },

    /// Another global subscriber was installed first
    #[error("global tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// What to log and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directives used when `RUST_LOG` is absent
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl From<&Config> for LogSettings {
    fn from(config: &Config) -> Self {
        Self {
            level: config.log_level.clone(),
            format: if config.log_json {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
        }
    }
}

impl LogSettings {
    /// Builds the event filter; non-blank `overrides` win over `level`.
    ///
    /// # Errors
    ///
    /// Returns `LogInitError::InvalidFilter` if the chosen directives do not
    /// parse.
    pub fn filter(&self, overrides: Option<&str>) -> Result<EnvFilter, LogInitError> {
        let directives = overrides
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.level);
        EnvFilter::try_new(directives).map_err(|source| LogInitError::InvalidFilter {
            directives: directives.to_string(),
            source,
        })
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns error if the filter is invalid or a subscriber is already set.
pub fn init(settings: &LogSettings) -> Result<(), LogInitError> {
    let overrides = std::env::var(FILTER_ENV).ok();
    let registry = tracing_subscriber::registry().with(settings.filter(overrides.as_deref())?);

    match settings.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init()?,
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    fn settings(level: &str) -> LogSettings {
        LogSettings {
            level: level.to_string(),
            format: LogFormat::Text,
        }
    }

    #[test]
    fn test_settings_follow_config() {
        let mut config = Config::default();
        assert_eq!(LogSettings::from(&config), settings("info"));

        config.log_level = "debug".to_string();
        config.log_json = true;
        let derived = LogSettings::from(&config);
        assert_eq!(derived.level, "debug");
        assert_eq!(derived.format, LogFormat::Json);
    }

    #[test]
    fn test_rust_log_overrides_configured_level() {
        let filter = settings("warn").filter(Some("oauth_lifecycle=trace")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_blank_rust_log_falls_back_to_level() {
        let filter = settings("warn").filter(Some("   ")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

        let filter = settings("error").filter(None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_invalid_directives_rejected() {
        let err = settings("oauth_lifecycle=loud").filter(None).unwrap_err();
        assert!(matches!(err, LogInitError::InvalidFilter { ref directives, .. } if directives == "oauth_lifecycle=loud"));
    }

    #[test]
    fn test_second_init_fails() {
        let settings = settings("info");
        let _ = init(&settings);
        assert!(matches!(
            init(&settings),
            Err(LogInitError::AlreadyInstalled(_))
        ));
    }
}
