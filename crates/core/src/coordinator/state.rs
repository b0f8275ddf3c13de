use crate::types::Phase;

/// Mutable protective state. Only the coordinator's handlers write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorState {
    /// Suppresses repeat low-battery notices until charge recovers.
    pub low_battery_warned: bool,
    /// A shutdown countdown is armed.
    pub countdown_active: bool,
    /// Seconds left; meaningful only while `countdown_active`.
    pub remaining_seconds: u32,
    /// Manual cancel; survives until charging resumes.
    pub protection_suspended: bool,
    /// Countdown hit zero and shutdown was requested. Terminal.
    pub expired: bool,
}

impl CoordinatorState {
    pub fn phase(&self) -> Phase {
        if self.protection_suspended {
            Phase::Suspended
        } else if self.countdown_active {
            Phase::CountdownArmed
        } else if self.low_battery_warned {
            Phase::LowWarned
        } else {
            Phase::Normal
        }
    }

    /// Remaining seconds, hidden while no countdown is armed.
    pub fn remaining(&self) -> Option<u32> {
        self.countdown_active.then_some(self.remaining_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clean() {
        let s = CoordinatorState::default();
        assert_eq!(s.phase(), Phase::Normal);
        assert_eq!(s.remaining(), None);
        assert!(!s.expired);
    }

    #[test]
    fn suspended_overrides_other_flags() {
        let s = CoordinatorState {
            low_battery_warned: true,
            countdown_active: true,
            remaining_seconds: 30,
            protection_suspended: true,
            expired: false,
        };
        assert_eq!(s.phase(), Phase::Suspended);
    }

    #[test]
    fn remaining_only_while_armed() {
        let mut s = CoordinatorState {
            remaining_seconds: 12,
            ..Default::default()
        };
        assert_eq!(s.remaining(), None);
        s.countdown_active = true;
        assert_eq!(s.remaining(), Some(12));
        assert_eq!(s.phase(), Phase::CountdownArmed);
    }
}
