use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use powerguard_sensor::Sample;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::countdown::CountdownTicker;
use super::signals::SignalGuard;
use crate::alert::AlertSink;
use crate::config::Thresholds;
use crate::coordinator::ShutdownCoordinator;
use crate::shutdown::{ShutdownError, ShutdownSink};
use crate::types::{Action, GuardEvent, GuardStatus};

/// Countdown granularity.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
/// Event queue depth. Producers wait when it is full.
const EVENT_BUFFER: usize = 64;

/// Why [`Runtime::run`] returned.
#[derive(Debug)]
pub enum RunOutcome {
    /// Monitor stopped (signal or token); the host keeps running.
    Stopped,
    /// The countdown expired and the host shutdown was issued.
    HostShutdownRequested,
    /// The countdown expired but the shutdown request itself failed.
    ShutdownFailed(ShutdownError),
}

impl RunOutcome {
    /// Only a failed shutdown request is an error for the process.
    pub fn into_result(self) -> Result<(), ShutdownError> {
        match self {
            Self::Stopped | Self::HostShutdownRequested => Ok(()),
            Self::ShutdownFailed(e) => Err(e),
        }
    }
}

/// Single owner of the coordinator. Samples, ticks and user input all arrive
/// on one queue and are handled one at a time, so protective state is never
/// touched concurrently.
pub struct Runtime {
    signals: SignalGuard,
    coordinator: ShutdownCoordinator,
    /// Inbound samples, ticks and user actions.
    event_rx: mpsc::Receiver<GuardEvent>,
    /// Kept for handing to the countdown ticker.
    event_tx: mpsc::Sender<GuardEvent>,
    alerts: Arc<dyn AlertSink>,
    shutdown: Arc<dyn ShutdownSink>,
    ticker: CountdownTicker,
    /// Drives poll cadence and the console `status` command.
    status_tx: watch::Sender<GuardStatus>,
    last_sample: Option<Sample>,
    last_sample_at: Option<chrono::DateTime<Utc>>,
}

impl Runtime {
    /// Create a new Runtime. Returns (Runtime, event_sender, status_receiver).
    pub fn new(
        thresholds: Thresholds,
        alerts: Arc<dyn AlertSink>,
        shutdown: Arc<dyn ShutdownSink>,
    ) -> (Self, mpsc::Sender<GuardEvent>, watch::Receiver<GuardStatus>) {
        let signals = SignalGuard::new();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (status_tx, status_rx) = watch::channel(GuardStatus::default());
        let runtime = Self {
            ticker: CountdownTicker::new(signals.token(), TICK_PERIOD),
            signals,
            coordinator: ShutdownCoordinator::new(thresholds),
            event_rx: rx,
            event_tx: tx.clone(),
            alerts,
            shutdown,
            status_tx,
            last_sample: None,
            last_sample_at: None,
        };
        (runtime, tx, status_rx)
    }

    /// Returns the cancellation token for spawning child tasks.
    pub fn token(&self) -> CancellationToken {
        self.signals.token()
    }

    /// Start the signal listener and process events until the monitor stops
    /// or the countdown expires.
    pub async fn run(&mut self) -> RunOutcome {
        self.signals.spawn_signal_listener();
        let token = self.signals.token();

        let t = self.coordinator.thresholds();
        tracing::info!(
            low = t.low_battery_percent,
            shutdown = t.shutdown_percent,
            shutdown_service = self.shutdown.name(),
            "powerguard runtime started"
        );

        let outcome = loop {
            tokio::select! {
                _ = token.cancelled() => break RunOutcome::Stopped,
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        break RunOutcome::Stopped;
                    };
                    if let Some(outcome) = self.handle(event).await {
                        break outcome;
                    }
                }
            }
        };

        self.ticker.stop();
        if matches!(outcome, RunOutcome::Stopped)
            && let Err(e) = self.alerts.close_countdown().await
        {
            tracing::debug!(error = %e, "failed to close countdown surface on stop");
        }
        token.cancel();
        tracing::info!(?outcome, "powerguard runtime stopped");
        outcome
    }

    /// Handle one event. Returns an outcome when the run is over.
    pub async fn handle(&mut self, event: GuardEvent) -> Option<RunOutcome> {
        let actions = match event {
            GuardEvent::Sample(sample) => {
                self.last_sample = Some(sample);
                self.last_sample_at = Some(Utc::now());
                let actions = self.coordinator.on_sample(sample);
                let state = self.coordinator.state();
                tracing::info!(
                    soc = sample.state_of_charge,
                    current = sample.current,
                    phase = %state.phase(),
                    remaining = ?state.remaining(),
                    "sample"
                );
                actions
            }
            GuardEvent::Tick { generation } => {
                if !self.ticker.is_current(generation) {
                    tracing::debug!(generation, "dropping tick from a stopped countdown");
                    return None;
                }
                self.coordinator.on_tick()
            }
            GuardEvent::Snooze => {
                tracing::info!("user requested snooze");
                self.coordinator.on_snooze()
            }
            GuardEvent::Cancel => {
                tracing::info!("user cancelled protection");
                self.coordinator.on_cancel()
            }
        };

        let outcome = self.execute(actions).await;
        self.publish_status();
        outcome
    }

    /// Carry out coordinator actions in order. Surface failures are logged
    /// and skipped; only the shutdown request ends the run.
    async fn execute(&mut self, actions: Vec<Action>) -> Option<RunOutcome> {
        for action in actions {
            match action {
                Action::Notify(notice) => self.alerts.notify(notice),
                Action::ShowCountdown { initial_seconds } => {
                    if let Err(e) = self.alerts.show_countdown(initial_seconds).await {
                        tracing::warn!(error = %e, "failed to show countdown surface");
                    }
                    self.ticker.start(self.event_tx.clone());
                }
                Action::UpdateCountdown { seconds_left, visible } => {
                    if let Err(e) = self.alerts.update_countdown(seconds_left, visible).await {
                        tracing::warn!(error = %e, seconds_left, "failed to update countdown surface");
                    }
                }
                Action::CloseCountdown => {
                    self.ticker.stop();
                    if let Err(e) = self.alerts.close_countdown().await {
                        tracing::warn!(error = %e, "failed to close countdown surface");
                    }
                }
                Action::ShutdownNow => {
                    self.ticker.stop();
                    return Some(match self.shutdown.shutdown_now().await {
                        Ok(()) => {
                            tracing::error!("host shutdown requested");
                            RunOutcome::HostShutdownRequested
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "host shutdown request failed");
                            RunOutcome::ShutdownFailed(e)
                        }
                    });
                }
            }
        }
        None
    }

    fn publish_status(&self) {
        let state = self.coordinator.state();
        // fails only when every receiver is gone
        let _ = self.status_tx.send(GuardStatus {
            phase: state.phase(),
            remaining_seconds: state.remaining(),
            countdown_visible: self.coordinator.countdown_visible(),
            last_sample: self.last_sample,
            last_sample_at: self.last_sample_at,
        });
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// Whether the once-per-second countdown ticker is running.
    pub fn ticking(&self) -> bool {
        self.ticker.is_running()
    }

    /// Generation of the current (or last) countdown ticker run.
    pub fn tick_generation(&self) -> u64 {
        self.ticker.generation()
    }
}
