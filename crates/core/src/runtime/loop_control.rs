use std::time::Duration;
use crate::config::Thresholds;

/// Poll cadence mode based on protective state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Normal,
    Emergency,
}

impl PollMode {
    pub fn interval(self, thresholds: &Thresholds) -> Duration {
        match self {
            Self::Normal => thresholds.normal_poll,
            Self::Emergency => thresholds.emergency_poll,
        }
    }
}

/// Poll faster while a shutdown countdown is armed so a returning supply is
/// noticed before the countdown runs out.
pub fn next_mode(countdown_active: bool) -> PollMode {
    if countdown_active {
        PollMode::Emergency
    } else {
        PollMode::Normal
    }
}
