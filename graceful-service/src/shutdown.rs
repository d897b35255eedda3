//! OS signal handling for graceful shutdown
//!
//! SIGTERM and SIGINT become a cancellation source that is merged with the
//! caller's [`CancellationToken`]: the token returned by [`signal_token`] is
//! cancelled by whichever fires first.

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Wait for a shutdown signal (SIGTERM or SIGINT)
///
/// Returns the name of the signal received. If a handler cannot be
/// installed the error is logged and that source never fires.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
            "SIGINT"
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
            "SIGTERM"
        },
    }
}

/// Derive a token cancelled by `parent` or by the first shutdown signal
///
/// The signal listener is a one-shot task that exits as soon as the returned
/// token is cancelled by any source, so cancelling the returned token (or
/// dropping a [`CancellationToken::drop_guard`] for it) releases the signal
/// subscription. Cancelling the returned token never cancels `parent`.
pub fn signal_token(parent: &CancellationToken) -> CancellationToken {
    let token = parent.child_token();
    let watched = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            name = shutdown_signal() => {
                tracing::debug!(signal = name, "Cancelling on shutdown signal");
                watched.cancel();
            }
            _ = watched.cancelled() => {}
        }
    });

    token
}
