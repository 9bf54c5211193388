//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured level when it is set.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::LoggingConfig;

/// Install the global tracing subscriber described by `config`
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            json: false,
        };
        // The first call may lose to another test; the second always fails.
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
