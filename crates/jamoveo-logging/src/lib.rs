//! # jamoveo-logging
//!
//! Structured logging with `tracing`.
//!
//! `RUST_LOG` wins when set; otherwise the filter is built from the
//! configured default level plus per-module overrides. Output is either
//! human-readable or one JSON object per line.

#![deny(unsafe_code)]

use jamoveo_settings::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Failures while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// A level or module directive could not be parsed.
    #[error("invalid log filter {directives:?}: {reason}")]
    InvalidFilter {
        /// The directive string that was rejected.
        directives: String,
        /// Parser detail.
        reason: String,
    },
    /// A global subscriber was already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Build the filter directive string from settings.
///
/// `info` with `{"jamoveo_session": "debug"}` becomes
/// `info,jamoveo_session=debug`.
pub fn filter_directives(config: &LoggingSettings) -> String {
    let mut directives = config.level.trim().to_lowercase();
    if directives.is_empty() {
        directives.push_str("info");
    }
    for (module, level) in &config.modules {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(&level.trim().to_lowercase());
    }
    directives
}

/// Resolve the effective filter: `RUST_LOG` if present, else the settings.
pub fn build_filter(config: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = filter_directives(config);
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        reason: e.to_string(),
        directives,
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn directives_default_level_only() {
        let config = LoggingSettings::default();
        assert_eq!(filter_directives(&config), "info");
    }

    #[test]
    fn directives_with_modules() {
        let mut modules = BTreeMap::new();
        let _ = modules.insert("jamoveo_session".to_string(), "DEBUG".to_string());
        let _ = modules.insert("tower_http".to_string(), "warn".to_string());
        let config = LoggingSettings {
            level: "Warn".into(),
            json: false,
            modules,
        };
        assert_eq!(
            filter_directives(&config),
            "warn,jamoveo_session=debug,tower_http=warn"
        );
    }

    #[test]
    fn blank_level_falls_back_to_info() {
        let config = LoggingSettings {
            level: "  ".into(),
            ..LoggingSettings::default()
        };
        assert_eq!(filter_directives(&config), "info");
    }

    #[test]
    fn valid_directives_parse() {
        let mut config = LoggingSettings::default();
        let _ = config
            .modules
            .insert("jamoveo_server".into(), "trace".into());
        assert!(EnvFilter::try_new(filter_directives(&config)).is_ok());
    }

    #[test]
    fn invalid_filter_error_display() {
        let err = LoggingError::InvalidFilter {
            directives: "x=[".into(),
            reason: "bad".into(),
        };
        assert!(err.to_string().contains("invalid log filter"));
    }
}
