//! Logging setup for applications embedding the engine

use crate::config::LoggingConfig;
use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
/// The zip crate's own debug output is kept at warn.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("{},zip=warn", config.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global fmt subscriber.
///
/// Fails if a global subscriber is already set.
pub fn try_init(config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Like [`try_init`], but a second call is a no-op
pub fn init(config: &LoggingConfig) {
    if let Err(e) = try_init(config) {
        tracing::debug!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init(&config);
        init(&config);
        assert!(try_init(&config).is_err());
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let config = LoggingConfig {
            level: "dmarcguard=loud".to_string(),
        };
        // Must not panic
        let _ = filter(&config);
    }
}
