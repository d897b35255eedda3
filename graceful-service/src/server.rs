//! HTTP server with graceful shutdown
//!
//! [`Server`] supervises the lifecycle of an axum [`Router`]:
//!
//! 1. mounts the health check handler on the configured path
//! 2. accepts connections on a background task
//! 3. waits until the caller's token is cancelled or SIGINT/SIGTERM arrives
//! 4. marks the service unhealthy, so probes fail before traffic is cut
//! 5. stops accepting and drains in-flight requests, force-closing whatever
//!    is left once `shutdown_timeout` has elapsed

use std::time::{Duration, Instant};

use axum::{extract::ConnectInfo, routing::get, Router};
use hyper::{body::Incoming, server::conn::http1, Request};
use hyper_util::{
    rt::{TokioIo, TokioTimer},
    server::graceful::GracefulShutdown,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::{
    config::Config,
    error::{Error, Result},
    health::{health_check, HealthState},
    shutdown::signal_token,
};

/// What to do when the listener fails before shutdown was requested
///
/// A server that cannot bind or keep listening has no useful degraded mode,
/// so the default is to log and exit the process. Embedders that want to
/// decide for themselves can ask for the failure to be returned instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListenerFailure {
    /// Log the failure and exit the process with status 1
    #[default]
    Exit,
    /// Return the failure from [`Server::run`] / [`Server::serve`]
    Return,
}

/// Server instance
pub struct Server {
    config: Config,
    health: HealthState,
    listener_failure: ListenerFailure,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self {
            config,
            health: HealthState::new(),
            listener_failure: ListenerFailure::default(),
        }
    }

    /// Choose how listener failures are handled
    pub fn with_listener_failure(mut self, policy: ListenerFailure) -> Self {
        self.listener_failure = policy;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Health state owned by this server
    ///
    /// The returned handle shares the server's flag. Other components may
    /// read it, but only the server marks it unhealthy.
    pub fn health(&self) -> HealthState {
        self.health.clone()
    }

    /// Bind the configured listen address and serve until shutdown
    pub async fn run(self, router: Router, shutdown: CancellationToken) -> Result<()> {
        self.config.validate()?;

        let addr = self.config.listen_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => return self.listener_failed(Error::Bind { addr, source }),
        };

        self.serve(listener, router, shutdown).await
    }

    /// Serve on an already bound listener until shutdown
    ///
    /// Returns `Ok(())` once every in-flight request has completed, or
    /// [`Error::ShutdownTimeout`] if the drain outlived `shutdown_timeout`.
    ///
    /// # Panics
    ///
    /// Panics if `router` already has a route at the health check path.
    pub async fn serve(
        self,
        listener: TcpListener,
        router: Router,
        shutdown: CancellationToken,
    ) -> Result<()> {
        self.config.validate()?;

        let local_addr = listener.local_addr()?;
        let app = router.route(
            &self.config.health_check_path,
            get(health_check).with_state(self.health.clone()),
        );

        let caller = shutdown;
        let shutdown = signal_token(&caller);
        let _signal_guard = shutdown.clone().drop_guard();

        let drain = CancellationToken::new();
        let force_close = CancellationToken::new();
        let mut accept_task: JoinHandle<()> = tokio::spawn(accept_loop(
            listener,
            app,
            self.config.read_timeout,
            drain.clone(),
            force_close.clone(),
        ));

        tracing::info!(
            address = %local_addr,
            health_check_path = %self.config.health_check_path,
            "Server listening"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {}
            joined = &mut accept_task => {
                let reason = match joined {
                    Ok(()) => "accept loop exited before shutdown".to_string(),
                    Err(e) => e.to_string(),
                };
                return self.listener_failed(Error::Listener(reason));
            }
        }

        let reason = if caller.is_cancelled() { "cancelled" } else { "signal" };
        tracing::warn!(reason, "Shutting down server");

        // Probes must fail before the listener stops accepting
        self.health.set_unhealthy();

        let started = Instant::now();
        drain.cancel();

        match tokio::time::timeout(self.config.shutdown_timeout, &mut accept_task).await {
            Ok(Ok(())) => {
                tracing::info!(elapsed = ?started.elapsed(), "Server shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Listener task failed during shutdown");
                Err(Error::Listener(e.to_string()))
            }
            Err(_) => {
                force_close.cancel();
                accept_task.abort();
                tracing::warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "Shutdown deadline exceeded, closing remaining connections"
                );
                Err(Error::ShutdownTimeout {
                    timeout: self.config.shutdown_timeout,
                })
            }
        }
    }

    fn listener_failed(&self, err: Error) -> Result<()> {
        tracing::error!(error = %err, "Failed to listen and serve");
        match self.listener_failure {
            ListenerFailure::Exit => std::process::exit(1),
            ListenerFailure::Return => Err(err),
        }
    }
}

/// Bind `config.listen`, serve `router`, and shut down gracefully on
/// cancellation of `shutdown` or on SIGINT/SIGTERM
///
/// Listener failures exit the process; see [`ListenerFailure`].
///
/// Once this has run, the process keeps tokio's SIGINT/SIGTERM handlers
/// installed: the default terminate-on-signal behaviour is not restored
/// after it returns. Embedders that keep running afterwards must handle
/// those signals themselves.
pub async fn listen_with_graceful_shutdown(
    shutdown: CancellationToken,
    router: Router,
    config: Config,
) -> Result<()> {
    Server::new(config).run(router, shutdown).await
}

async fn accept_loop(
    listener: TcpListener,
    app: Router,
    read_timeout: Duration,
    drain: CancellationToken,
    force_close: CancellationToken,
) {
    let graceful = GracefulShutdown::new();

    // A zero read timeout means no deadline, not hyper's 30s default
    let header_read_timeout = Some(read_timeout).filter(|t| !t.is_zero());

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout);

    loop {
        let (stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) if is_connection_error(&e) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Accept error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            },
            _ = drain.cancelled() => break,
        };

        let tower_service = app.clone();
        let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(remote_addr));
            tower_service.clone().oneshot(request)
        });

        let conn = graceful.watch(
            builder
                .serve_connection(TokioIo::new(stream), service)
                .with_upgrades(),
        );
        let force_close = force_close.clone();

        tokio::spawn(async move {
            tokio::select! {
                result = conn => {
                    if let Err(e) = result {
                        tracing::debug!(peer = %remote_addr, error = %e, "Connection error");
                    }
                }
                _ = force_close.cancelled() => {
                    tracing::debug!(peer = %remote_addr, "Connection force-closed");
                }
            }
        });
    }

    // Stop accepting before waiting on in-flight connections
    drop(listener);
    tracing::debug!("Listener closed, draining connections");
    graceful.shutdown().await;
}

fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}
