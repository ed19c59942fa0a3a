//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

use cw7_common::{NcError, NcResult};

use crate::config::LogConfig;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "CW7_LOG";

fn filter(config: &LogConfig) -> NcResult<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.level),
    }
    .map_err(|e| NcError::config(format!("Invalid log filter: {}", e)))
}

/// Installs the global fmt subscriber.
///
/// Fails if a subscriber is already installed or the filter does not parse.
pub fn try_init(config: &LogConfig) -> NcResult<()> {
    fmt()
        .with_env_filter(filter(config)?)
        .with_target(config.with_target)
        .try_init()
        .map_err(|e| NcError::config(format!("Failed to set tracing subscriber: {}", e)))
}

/// Installs the global fmt subscriber, ignoring a second installation.
pub fn init(config: &LogConfig) {
    if let Err(e) = try_init(config) {
        tracing::debug!(error = %e, "Tracing subscriber not installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rejects_garbage() {
        let config = LogConfig {
            level: "cw7_session=notalevel".into(),
            with_target: true,
        };
        if std::env::var(LOG_ENV).is_err() {
            assert!(filter(&config).is_err());
        }
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig::default();
        init(&config);
        init(&config);
    }
}
