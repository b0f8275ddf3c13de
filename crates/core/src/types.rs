use std::fmt;

use chrono::{DateTime, Utc};
use powerguard_sensor::Sample;
use serde::Serialize;

// ── Events into the runtime ──

/// Everything the runtime reacts to arrives through one queue as a `GuardEvent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuardEvent {
    /// A fresh reading from the poll loop.
    Sample(Sample),
    /// One second of countdown elapsed, stamped with the ticker run that sent it.
    Tick { generation: u64 },
    /// User asked for more time.
    Snooze,
    /// User disabled protection until power returns.
    Cancel,
}

// ── Actions out of the coordinator ──

/// User-facing notice. Rendered by the alert sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    LowBattery { state_of_charge: u8 },
    PowerRestored,
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::LowBattery { .. } => "Low battery",
            Notice::PowerRestored => "Power restored",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::LowBattery { state_of_charge } => {
                format!("Battery at {state_of_charge}% and discharging.")
            }
            Notice::PowerRestored => "Shutdown cancelled.".to_owned(),
        }
    }
}

/// Side effect requested by the coordinator. The runtime carries these out
/// in order, outside of any state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Notify(Notice),
    ShowCountdown { initial_seconds: u32 },
    UpdateCountdown { seconds_left: u32, visible: bool },
    CloseCountdown,
    ShutdownNow,
}

// ── Status ──

/// Protective phase derived from the coordinator flags.
/// `Suspended` wins over everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    #[default]
    Normal,
    LowWarned,
    CountdownArmed,
    Suspended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Normal => write!(f, "Normal"),
            Phase::LowWarned => write!(f, "LowWarned"),
            Phase::CountdownArmed => write!(f, "CountdownArmed"),
            Phase::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Snapshot broadcast by the runtime after every event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GuardStatus {
    pub phase: Phase,
    /// Seconds until shutdown; only set while a countdown is armed.
    pub remaining_seconds: Option<u32>,
    pub countdown_visible: bool,
    pub last_sample: Option<Sample>,
    pub last_sample_at: Option<DateTime<Utc>>,
}

impl GuardStatus {
    pub fn countdown_active(&self) -> bool {
        self.remaining_seconds.is_some()
    }

    /// One-line human summary, used by the console `status` command.
    pub fn summary(&self) -> String {
        let mut line = match self.last_sample {
            Some(s) => format!("charge {}%, current {:+.2} A", s.state_of_charge, s.current),
            None => "no sample yet".to_owned(),
        };
        match (self.phase, self.remaining_seconds) {
            (Phase::Suspended, _) => line.push_str(" [protection off]"),
            (_, Some(left)) => {
                let shown = if self.countdown_visible { "on screen" } else { "hidden" };
                line.push_str(&format!(" [shutdown in {left}s | {shown}]"));
            }
            (Phase::LowWarned, None) => line.push_str(" [low battery]"),
            _ => {}
        }
        line
    }
}
