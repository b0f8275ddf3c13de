use std::sync::Arc;

use powerguard_sensor::SampleSource;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::loop_control::{self, PollMode};
use crate::config::Thresholds;
use crate::types::{GuardEvent, GuardStatus};

/// Spawn the sensor poll task.
///
/// Fetches a sample, forwards it to the runtime, then waits for the current
/// cadence. The cadence follows the published status: a countdown being armed
/// while waiting pulls the next fetch forward.
pub fn spawn(
    source: Arc<dyn SampleSource>,
    event_tx: mpsc::Sender<GuardEvent>,
    status_rx: watch::Receiver<GuardStatus>,
    thresholds: Thresholds,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run(source, event_tx, status_rx, thresholds, cancel))
}

async fn run(
    source: Arc<dyn SampleSource>,
    event_tx: mpsc::Sender<GuardEvent>,
    mut status_rx: watch::Receiver<GuardStatus>,
    thresholds: Thresholds,
    cancel: CancellationToken,
) {
    tracing::info!(source = source.name(), "poll loop started");
    let mut failures: u32 = 0;

    loop {
        let started = Instant::now();

        let fetched = tokio::select! {
            _ = cancel.cancelled() => break,
            fetched = source.fetch() => fetched,
        };

        match fetched {
            Ok(sample) => {
                if failures > 0 {
                    tracing::info!(failures, "sensor reachable again");
                    failures = 0;
                }
                if event_tx.send(GuardEvent::Sample(sample)).await.is_err() {
                    tracing::warn!("poll loop: event channel closed");
                    break;
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                tracing::warn!(error = %e, consecutive_failures = failures, "no connection to sensor");
            }
        }

        let mut mode = mode_for(&status_rx.borrow_and_update());
        loop {
            let deadline = started + mode.interval(&thresholds);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("poll loop shutting down");
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("poll loop: status channel closed");
                        return;
                    }
                    let next = mode_for(&status_rx.borrow_and_update());
                    if next != mode {
                        tracing::debug!(from = ?mode, to = ?next, "poll cadence changed");
                        mode = next;
                    }
                }
            }
        }
    }

    tracing::info!("poll loop shutting down");
}

/// Cadence the poll loop would pick for a given status.
pub fn mode_for(status: &GuardStatus) -> PollMode {
    loop_control::next_mode(status.countdown_active())
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerguard_sensor::{MockSource, Sample, SensorError};
    use std::time::Duration;

    fn thresholds() -> Thresholds {
        Thresholds::default()
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_samples_on_normal_cadence() {
        let source = Arc::new(MockSource::samples([Sample::new(80, -0.2), Sample::new(79, -0.2)]));
        let (tx, mut rx) = mpsc::channel(8);
        let (_status_tx, status_rx) = watch::channel(GuardStatus::default());
        let cancel = CancellationToken::new();
        let handle = spawn(source.clone(), tx, status_rx, thresholds(), cancel.clone());

        let start = Instant::now();
        assert_eq!(rx.recv().await, Some(GuardEvent::Sample(Sample::new(80, -0.2))));
        assert_eq!(rx.recv().await, Some(GuardEvent::Sample(Sample::new(79, -0.2))));
        assert!(start.elapsed() >= Duration::from_secs(60));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_forwarded() {
        let source = Arc::new(MockSource::new([
            Err(SensorError::Timeout),
            Ok(Sample::new(50, 1.0)),
        ]));
        let (tx, mut rx) = mpsc::channel(8);
        let (_status_tx, status_rx) = watch::channel(GuardStatus::default());
        let cancel = CancellationToken::new();
        let handle = spawn(source.clone(), tx, status_rx, thresholds(), cancel.clone());

        // The timeout cycle is skipped; the next sample arrives one interval later.
        assert_eq!(rx.recv().await, Some(GuardEvent::Sample(Sample::new(50, 1.0))));
        assert_eq!(source.fetch_count(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn armed_countdown_shortens_the_wait() {
        let source = Arc::new(MockSource::samples([Sample::new(4, -0.5), Sample::new(4, -0.5)]));
        let (tx, mut rx) = mpsc::channel(8);
        let (status_tx, status_rx) = watch::channel(GuardStatus::default());
        let cancel = CancellationToken::new();
        let handle = spawn(source.clone(), tx, status_rx, thresholds(), cancel.clone());

        let start = Instant::now();
        assert!(rx.recv().await.is_some());
        status_tx
            .send(GuardStatus {
                remaining_seconds: Some(60),
                ..Default::default()
            })
            .unwrap();
        assert!(rx.recv().await.is_some());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(60));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn mode_follows_status() {
        assert_eq!(mode_for(&GuardStatus::default()), PollMode::Normal);
        let armed = GuardStatus {
            remaining_seconds: Some(3),
            ..Default::default()
        };
        assert_eq!(mode_for(&armed), PollMode::Emergency);
    }
}
