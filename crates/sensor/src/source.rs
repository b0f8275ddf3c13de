use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One reading from the battery management board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// State of charge, percent (0–100).
    pub state_of_charge: u8,
    /// Battery current in amps. Negative means the pack is discharging.
    pub current: f64,
}

impl Sample {
    pub fn new(state_of_charge: u8, current: f64) -> Self {
        Self { state_of_charge, current }
    }

    /// Zero current counts as "not discharging".
    pub fn is_charging(&self) -> bool {
        self.current >= 0.0
    }

    /// Parse the board's JSON body: `{"s": <soc>, "c": <amps>}`.
    ///
    /// Fractional charge rounds up, so integer threshold checks agree with
    /// comparing the raw reading.
    pub fn from_json(body: &[u8]) -> Result<Self, SensorError> {
        let wire: WireSample =
            serde_json::from_slice(body).map_err(|e| SensorError::Malformed(e.to_string()))?;

        let soc = wire
            .s
            .and_then(|n| n.as_f64())
            .filter(|v| v.is_finite())
            .ok_or_else(|| SensorError::Malformed("missing state of charge (s)".into()))?;
        let current = wire
            .c
            .and_then(|n| n.as_f64())
            .filter(|v| v.is_finite())
            .ok_or_else(|| SensorError::Malformed("missing current (c)".into()))?;

        Ok(Self {
            state_of_charge: soc.ceil().clamp(0.0, 100.0) as u8,
            current,
        })
    }
}

/// Body shape served by the board. Unknown fields are ignored.
#[derive(Deserialize)]
struct WireSample {
    s: Option<serde_json::Number>,
    c: Option<serde_json::Number>,
}

/// Why a fetch produced no sample this cycle.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("sensor unreachable: {0}")]
    Transport(String),
    #[error("sensor timed out")]
    Timeout,
    #[error("sensor answered with status {0}")]
    BadStatus(u16),
    #[error("malformed sample: {0}")]
    Malformed(String),
}

/// Anything that can produce battery samples.
pub trait SampleSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Sample, SensorError>> + Send + '_>>;
}

/// Scripted source for tests and demos. Pops one result per fetch.
#[derive(Debug, Default)]
pub struct MockSource {
    script: Mutex<VecDeque<Result<Sample, SensorError>>>,
    fetches: AtomicUsize,
}

impl MockSource {
    pub fn new(script: impl IntoIterator<Item = Result<Sample, SensorError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Shorthand for a script made only of successful readings.
    pub fn samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self::new(samples.into_iter().map(Ok))
    }

    /// Number of fetches served so far, including exhausted ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SampleSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Sample, SensorError>> + Send + '_>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err(SensorError::Transport("script exhausted".into())));
        Box::pin(async move { next })
    }
}
