//! The irreversible host shutdown capability.

mod system;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

pub use system::{SystemShutdown, shutdown_command};

/// The shutdown request could not be issued.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    CommandFailed { program: String, status: String },
}

/// Asks the host to power off. Irreversible once called.
#[async_trait]
pub trait ShutdownSink: Send + Sync {
    fn name(&self) -> &str;

    async fn shutdown_now(&self) -> Result<(), ShutdownError>;
}

/// Logs instead of shutting down. Selected with `POWERGUARD_DRY_RUN=1`.
#[derive(Debug, Default)]
pub struct DryRunShutdown;

#[async_trait]
impl ShutdownSink for DryRunShutdown {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn shutdown_now(&self) -> Result<(), ShutdownError> {
        tracing::error!("dry run: host shutdown would be requested now");
        Ok(())
    }
}

/// Counts requests; never touches the host.
#[derive(Debug, Default)]
pub struct RecordingShutdown {
    calls: AtomicUsize,
}

impl RecordingShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShutdownSink for RecordingShutdown {
    fn name(&self) -> &str {
        "recording"
    }

    async fn shutdown_now(&self) -> Result<(), ShutdownError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
