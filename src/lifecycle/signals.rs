//! OS signal handling.
//!
//! # Responsibilities
//! - SIGTERM and Ctrl+C trigger graceful shutdown
//! - SIGHUP triggers a route reload, the same as `POST /` on the control
//!   socket
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed SIGHUP reload is logged and the server keeps running

use std::io;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use crate::control::Reloader;
use crate::lifecycle::Shutdown;

/// Install handlers and spawn the signal loop.
///
/// The loop exits once shutdown has been triggered.
pub fn spawn_signal_handler(
    reloader: Arc<Reloader>,
    shutdown: Arc<Shutdown>,
) -> io::Result<tokio::task::JoinHandle<()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut stop = shutdown.subscribe();

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, reloading routes");
                    // Errors are already logged by the reloader.
                    let _ = reloader.reload().await;
                }
                _ = terminate.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                    shutdown.trigger();
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down");
                    shutdown.trigger();
                }
                _ = stop.recv() => break,
            }
        }
    }))
}
