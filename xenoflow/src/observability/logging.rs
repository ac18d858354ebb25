//! `tracing-subscriber` setup.

use crate::config::{LogConfig, LogFormat};
use crate::errors::ConfigError;
use tracing_subscriber::EnvFilter;

/// Parses a level directive such as `info` or `xenoflow=debug,warn`.
pub fn filter_from_level(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(level).map_err(|e| {
        ConfigError::new(format!("invalid log level '{level}': {e}")).with_key("log.level")
    })
}

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG`, when set and valid, overrides the configured level.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the level cannot be parsed or a subscriber
/// is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_from_level(&config.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ConfigError::new(format!("cannot install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_level() {
        assert!(filter_from_level("info").is_ok());
        assert!(filter_from_level("xenoflow=debug,warn").is_ok());

        let err = filter_from_level("xenoflow=loudest").unwrap_err();
        assert_eq!(err.key.as_deref(), Some("log.level"));
    }
}
