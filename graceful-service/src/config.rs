//! Configuration management using Figment
//!
//! Configuration is loaded from the following sources (highest precedence first):
//! 1. Environment variables (`READ_TIMEOUT`, `SHUTDOWN_TIMEOUT`, `LISTEN`,
//!    `HEALTH_CHECK_PATH`, `LOG_LEVEL`)
//! 2. An optional TOML file passed to [`Config::load_from`]
//! 3. Default values
//!
//! Durations use humantime syntax: `5s`, `150ms`, `1m 30s`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// Environment variables recognised by [`Config::load`]
pub const ENV_KEYS: [&str; 5] = [
    "READ_TIMEOUT",
    "SHUTDOWN_TIMEOUT",
    "LISTEN",
    "HEALTH_CHECK_PATH",
    "LOG_LEVEL",
];

/// Lifecycle configuration for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Time allowed to read a request's headers, starting when the
    /// connection begins a new request
    ///
    /// The request body is not covered; handlers reading large bodies should
    /// bound them separately. Zero disables the deadline.
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Time allowed for in-flight requests to drain once shutdown starts
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Listen address, either `host:port` or `:port` for all interfaces
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path the health check handler is mounted on
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,

    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_read_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_listen() -> String {
    ":8080".to_string()
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from defaults and the process environment
    pub fn load() -> Result<Self> {
        Self::figment().extract().map_err(Into::into)
    }

    /// Load configuration from a TOML file, with environment variables
    /// still taking precedence over the file
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from(path: &str) -> Result<Self> {
        tracing::debug!("Loading configuration from: {}", path);

        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    /// The figment used by [`Config::load`], exposed for callers that want to
    /// layer additional providers on top
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Self::env())
    }

    fn env() -> Env {
        Env::raw().only(&ENV_KEYS)
    }

    /// Check the values the router and listener would otherwise panic or
    /// fail obscurely on
    pub fn validate(&self) -> Result<()> {
        if self.listen.is_empty() {
            return Err(figment::Error::from("listen address must not be empty".to_string()).into());
        }
        if !self.health_check_path.starts_with('/') {
            return Err(figment::Error::from(format!(
                "health check path {:?} must start with '/'",
                self.health_check_path
            ))
            .into());
        }
        Ok(())
    }

    /// Address suitable for [`tokio::net::TcpListener::bind`]
    ///
    /// A bare `:port` binds every IPv4 interface.
    pub fn listen_addr(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_timeout: default_read_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            listen: default_listen(),
            health_check_path: default_health_check_path(),
            log_level: default_log_level(),
        }
    }
}
