use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Stops the monitor on SIGTERM / Ctrl+C via a CancellationToken.
/// Stopping the monitor never shuts the host down.
#[derive(Debug)]
pub struct SignalGuard {
    token: CancellationToken,
}

impl SignalGuard {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// The cancellation token that all tasks should monitor.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a background task that listens for OS signals and triggers cancellation.
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to register SIGTERM handler");
                        return;
                    }
                };
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, stopping monitor"),
                    _ = signal::ctrl_c() => tracing::info!("received Ctrl+C, stopping monitor"),
                    _ = token.cancelled() => return,
                }
            }
            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = signal::ctrl_c() => tracing::info!("received Ctrl+C, stopping monitor"),
                    _ = token.cancelled() => return,
                }
            }
            token.cancel();
        });
    }
}

impl Default for SignalGuard {
    fn default() -> Self {
        Self::new()
    }
}
