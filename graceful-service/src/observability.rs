//! Structured logging
//!
//! Logs are emitted as JSON lines. The filter comes from `Config::log_level`,
//! which accepts anything [`EnvFilter`] does (`info`, `warn,my_service=debug`).

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global JSON subscriber
///
/// Calling this more than once is harmless: if a global subscriber is
/// already set it is left in place.
pub fn init_tracing(config: &Config) -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(&config.log_level))
        .try_init();

    match installed {
        Ok(()) => tracing::info!(log_level = %config.log_level, "Tracing initialized"),
        Err(e) => tracing::debug!("Tracing subscriber already installed: {}", e),
    }

    Ok(())
}
