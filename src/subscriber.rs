//! `tracing-subscriber` setup for the command-line binary.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

#[derive(Error, Debug)]
pub enum SubscriberError {
    #[error("Invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

/// Filter directive for a run: `-v` picks `info`, `-vv` and above `debug`;
/// otherwise `RUST_LOG` if set, then the configured level.
pub fn directive(config: &LoggingConfig, verbose: u8) -> String {
    match verbose {
        0 => std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| config.level.clone()),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn filter(directive: &str) -> Result<EnvFilter, SubscriberError> {
    EnvFilter::try_new(directive).map_err(|source| SubscriberError::Filter {
        directive: directive.to_string(),
        source,
    })
}

/// Install a global subscriber writing to stderr.
pub fn init(config: &LoggingConfig, verbose: u8) -> Result<(), SubscriberError> {
    let filter = filter(&directive(config, verbose))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.target)
        .with_ansi(config.color);

    let installed = match (config.format, config.timestamps) {
        (LogFormat::Json, true) => builder.json().try_init(),
        (LogFormat::Json, false) => builder.json().without_time().try_init(),
        (LogFormat::Text, true) => builder.try_init(),
        (LogFormat::Text, false) => builder.without_time().try_init(),
    };
    installed.map_err(|e| SubscriberError::Install(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_overrides_level() {
        let config = LoggingConfig::default();
        assert_eq!(directive(&config, 1), "info");
        assert_eq!(directive(&config, 2), "debug");
        assert_eq!(directive(&config, 5), "debug");
    }

    #[test]
    fn invalid_filter_rejected() {
        assert!(filter("vk_thunkgen=debug").is_ok());
        let err = filter("vk_thunkgen=loud").unwrap_err();
        assert!(matches!(err, SubscriberError::Filter { ref directive, .. } if directive == "vk_thunkgen=loud"));
    }
}
