pub mod console;

use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::Notice;

pub use console::ConsoleAlerts;

/// The countdown surface could not be driven.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface owner is gone")]
    OwnerGone,
}

/// User-facing alerts: one-shot notices plus the countdown surface.
///
/// Surface calls are idempotent; closing a closed surface does nothing.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Fire-and-forget notice. Failures are swallowed by the implementation.
    fn notify(&self, notice: Notice);

    async fn show_countdown(&self, initial_seconds: u32) -> Result<(), SurfaceError>;

    async fn update_countdown(&self, seconds_left: u32, visible: bool) -> Result<(), SurfaceError>;

    async fn close_countdown(&self) -> Result<(), SurfaceError>;
}

/// What a [`RecordingAlerts`] saw, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCall {
    Notify(Notice),
    Show(u32),
    Update { seconds_left: u32, visible: bool },
    Close,
}

/// Alert sink that only records calls. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingAlerts {
    calls: Mutex<Vec<AlertCall>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AlertCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                AlertCall::Notify(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AlertCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: AlertCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl AlertSink for RecordingAlerts {
    fn notify(&self, notice: Notice) {
        self.record(AlertCall::Notify(notice));
    }

    async fn show_countdown(&self, initial_seconds: u32) -> Result<(), SurfaceError> {
        self.record(AlertCall::Show(initial_seconds));
        Ok(())
    }

    async fn update_countdown(&self, seconds_left: u32, visible: bool) -> Result<(), SurfaceError> {
        self.record(AlertCall::Update { seconds_left, visible });
        Ok(())
    }

    async fn close_countdown(&self) -> Result<(), SurfaceError> {
        self.record(AlertCall::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_sink_keeps_order() {
        let sink = RecordingAlerts::new();
        sink.notify(Notice::PowerRestored);
        sink.show_countdown(60).await.unwrap();
        sink.update_countdown(59, true).await.unwrap();
        sink.close_countdown().await.unwrap();
        assert_eq!(
            sink.calls(),
            vec![
                AlertCall::Notify(Notice::PowerRestored),
                AlertCall::Show(60),
                AlertCall::Update { seconds_left: 59, visible: true },
                AlertCall::Close,
            ]
        );
        assert_eq!(sink.notices(), vec![Notice::PowerRestored]);
        assert_eq!(sink.count(|c| matches!(c, AlertCall::Close)), 1);
    }
}
