//! Logging bootstrap
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::LoggingConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to install log subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Case-insensitive; `None` for unknown formats.
    pub fn parse(format: &str) -> Option<Self> {
        if format.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if format.eq_ignore_ascii_case("pretty") {
            Some(Self::Pretty)
        } else {
            None
        }
    }

    /// Unknown formats fall back to JSON; `LoggingConfig::validate` rejects them first.
    pub fn from_config(format: &str) -> Self {
        Self::parse(format).unwrap_or_default()
    }
}

pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.level)?),
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = env_filter(config)?;
    match LogFormat::from_config(&config.format) {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_config() {
        assert_eq!(LogFormat::from_config("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_config("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_config("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("Json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("plain"), None);
    }

    #[test]
    fn test_validation_and_selection_agree() {
        for format in ["json", "JSON", "pretty", "Pretty", "PRETTY", "plain", ""] {
            let config = LoggingConfig {
                level: "info".to_string(),
                format: format.to_string(),
            };
            assert_eq!(
                config.validate().is_ok(),
                LogFormat::parse(format).is_some(),
                "{format:?}"
            );
        }
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "PRETTY".to_string(),
        };
        assert!(config.validate().is_ok());
        assert_eq!(LogFormat::from_config(&config.format), LogFormat::Pretty);
    }
}
