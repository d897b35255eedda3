//! # graceful-service
//!
//! Lifecycle plumbing for axum HTTP services running under an orchestrator.
//!
//! ## Features
//!
//! - **Graceful shutdown**: SIGINT/SIGTERM or a caller-supplied cancellation
//!   token start a bounded drain of in-flight requests
//! - **Health probe**: a JSON health endpoint that starts failing as soon as
//!   shutdown begins, before the listener stops accepting
//! - **Configuration**: environment variables and optional TOML via figment
//! - **Request helpers**: typed path/query parameters, pagination and
//!   Cloudflare client-origin headers
//!
//! ## Example
//!
//! ```rust,no_run
//! use graceful_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let app = Router::new().route("/", get(|| async { "hello" }));
//!
//!     // Returns once SIGINT/SIGTERM arrives and in-flight requests drain
//!     listen_with_graceful_shutdown(CancellationToken::new(), app, config).await
//! }
//! ```

pub mod cloudflare;
pub mod config;
pub mod error;
pub mod health;
pub mod observability;
pub mod params;
pub mod server;
pub mod shutdown;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cloudflare::{ip_country, origin_ip, CloudflareOrigin};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::health::{health_check, HealthResponse, HealthState};
    pub use crate::observability::init_tracing;
    pub use crate::params::{
        int64_param, int64_query, pagination, uuid_param, Pagination, ParamError,
    };
    pub use crate::server::{listen_with_graceful_shutdown, ListenerFailure, Server};
    pub use crate::shutdown::{shutdown_signal, signal_token};

    pub use axum::{
        extract::{Path, Query, State},
        routing::{get, post},
        Json, Router,
    };
    pub use tokio_util::sync::CancellationToken;
}
