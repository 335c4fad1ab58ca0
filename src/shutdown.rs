//! Signal-driven shutdown coordination.
//!
//! A [`ShutdownToken`] is the single coordination point between the signal
//! listener, the control loop, and the capture session's wait loop. It holds
//! two cancellation tokens: `graceful` (first interrupt: ask the capture
//! subprocess to finish its current segment) and `forceful` (repeated
//! interrupt: kill the subprocess).

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shared shutdown state passed explicitly into every long-lived task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    graceful: CancellationToken,
    forceful: CancellationToken,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop (first interrupt).
    pub fn request_graceful(&self) {
        self.graceful.cancel();
    }

    /// Escalate to a forceful stop (second interrupt).
    ///
    /// Implies a graceful request so waiters on either token wake up.
    pub fn request_forceful(&self) {
        self.graceful.cancel();
        self.forceful.cancel();
    }

    /// Completes once a graceful stop has been requested.
    pub async fn graceful_requested(&self) {
        self.graceful.cancelled().await;
    }

    /// Completes once a forceful stop has been requested.
    pub async fn forceful_requested(&self) {
        self.forceful.cancelled().await;
    }

    /// Whether any stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.graceful.is_cancelled()
    }

    /// Whether the forceful escalation has been requested.
    pub fn is_forceful(&self) -> bool {
        self.forceful.is_cancelled()
    }
}

/// Install the signal listener and return the shared token.
///
/// The first interrupt requests a graceful stop, the second escalates to a
/// forceful one; further signals are left at their default disposition once
/// both tokens are cancelled.
pub fn install() -> ShutdownToken {
    let token = ShutdownToken::new();
    let listener = token.clone();

    tokio::spawn(async move {
        if interrupt().await.is_err() {
            warn!("failed to register signal handler; shutdown signals will not be handled");
            return;
        }
        info!("interrupt received, asking capture to finish its current segment");
        listener.request_graceful();

        if interrupt().await.is_err() {
            return;
        }
        warn!("second interrupt received, forcing capture to stop");
        listener.request_forceful();
    });

    token
}

/// Wait for one termination signal (SIGINT or SIGTERM on unix, Ctrl-C elsewhere).
#[cfg(unix)]
async fn interrupt() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn interrupt() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
