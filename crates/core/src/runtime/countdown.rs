use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::types::GuardEvent;

/// Countdown ticker: at most one task sending `GuardEvent::Tick` once per period.
#[derive(Debug)]
pub struct CountdownTicker {
    period: Duration,
    parent: CancellationToken,
    current_token: Option<CancellationToken>,
    generation: u64,
}

impl CountdownTicker {
    /// `parent` cancels any running ticker when the whole monitor stops.
    pub fn new(parent: CancellationToken, period: Duration) -> Self {
        Self {
            period,
            parent,
            current_token: None,
            generation: 0,
        }
    }

    /// Start ticking into `tx`. Returns false if a ticker is already running.
    /// The first tick fires immediately. Each start gets a new generation.
    pub fn start(&mut self, tx: mpsc::Sender<GuardEvent>) -> bool {
        if self.is_running() {
            return false;
        }
        self.generation += 1;
        let token = self.parent.child_token();
        tokio::spawn(run(self.period, self.generation, tx, token.clone()));
        self.current_token = Some(token);
        true
    }

    /// Stop the running ticker (if any).
    pub fn stop(&mut self) {
        if let Some(token) = self.current_token.take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.current_token
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a tick came from the ticker that is running now. Ticks still
    /// queued from a stopped run are stale.
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_running() && generation == self.generation
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(period: Duration, generation: u64, tx: mpsc::Sender<GuardEvent>, token: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = interval.tick() => {}
        }
        tokio::select! {
            _ = token.cancelled() => return,
            sent = tx.send(GuardEvent::Tick { generation }) => {
                if sent.is_err() {
                    tracing::debug!("countdown ticker: event channel closed");
                    return;
                }
            }
        }
    }
}
