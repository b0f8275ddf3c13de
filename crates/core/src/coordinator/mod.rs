//! Shutdown coordination state machine.
//!
//! Pure logic: every handler mutates [`CoordinatorState`] and returns the
//! [`Action`]s the caller must perform. No I/O happens here, so the runtime
//! can drive it from a single task and tests can drive it directly.

mod state;

pub use state::CoordinatorState;

use powerguard_sensor::Sample;

use crate::config::Thresholds;
use crate::types::{Action, Notice, Phase};

/// Owns all protective state: low-battery warning, countdown, manual suspension.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    thresholds: Thresholds,
    state: CoordinatorState,
}

impl ShutdownCoordinator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: CoordinatorState::default(),
        }
    }

    /// Feed one sensor reading.
    pub fn on_sample(&mut self, sample: Sample) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state.expired {
            return actions;
        }

        let soc = sample.state_of_charge;

        if sample.is_charging() {
            if self.state.countdown_active {
                tracing::info!(soc, current = sample.current, "power restored, cancelling countdown");
                self.state.countdown_active = false;
                self.state.remaining_seconds = 0;
                actions.push(Action::Notify(Notice::PowerRestored));
                actions.push(Action::CloseCountdown);
            }
            if self.state.protection_suspended {
                tracing::info!("power restored, protection resumed");
                self.state.protection_suspended = false;
            }
            if soc > self.thresholds.low_battery_percent {
                self.state.low_battery_warned = false;
            }
            return actions;
        }

        if self.state.protection_suspended {
            return actions;
        }

        if soc <= self.thresholds.shutdown_percent {
            if !self.state.countdown_active {
                tracing::warn!(
                    soc,
                    seconds = self.thresholds.countdown_start_secs,
                    "critical charge, arming shutdown countdown"
                );
                self.state.countdown_active = true;
                self.state.remaining_seconds = self.thresholds.countdown_start_secs;
                actions.push(Action::ShowCountdown {
                    initial_seconds: self.thresholds.countdown_start_secs,
                });
            }
        } else if soc <= self.thresholds.low_battery_percent {
            if !self.state.low_battery_warned {
                tracing::warn!(soc, "low battery");
                self.state.low_battery_warned = true;
                actions.push(Action::Notify(Notice::LowBattery { state_of_charge: soc }));
            }
        } else {
            self.state.low_battery_warned = false;
        }

        actions
    }

    /// One second elapsed on the countdown surface.
    pub fn on_tick(&mut self) -> Vec<Action> {
        if self.state.expired {
            return Vec::new();
        }
        if !self.state.countdown_active {
            return vec![Action::CloseCountdown];
        }

        let left = self.state.remaining_seconds;
        let mut actions = vec![Action::UpdateCountdown {
            seconds_left: left,
            visible: left <= self.thresholds.warning_visible_below_secs,
        }];

        if left > 0 {
            self.state.remaining_seconds = left - 1;
        } else {
            tracing::error!("countdown expired, requesting host shutdown");
            self.state.expired = true;
            self.state.countdown_active = false;
            actions.push(Action::CloseCountdown);
            actions.push(Action::ShutdownNow);
        }
        actions
    }

    /// Add snooze time and hide the surface. Ignored when nothing is armed.
    pub fn on_snooze(&mut self) -> Vec<Action> {
        if self.state.expired || !self.state.countdown_active {
            return Vec::new();
        }
        self.state.remaining_seconds = self
            .state
            .remaining_seconds
            .saturating_add(self.thresholds.snooze_secs);
        tracing::info!(
            added = self.thresholds.snooze_secs,
            remaining = self.state.remaining_seconds,
            "countdown snoozed"
        );
        vec![Action::UpdateCountdown {
            seconds_left: self.state.remaining_seconds,
            visible: false,
        }]
    }

    /// Disable discharge protection until power returns.
    pub fn on_cancel(&mut self) -> Vec<Action> {
        if self.state.expired {
            return Vec::new();
        }
        tracing::warn!("protection suspended by user until power is restored");
        self.state.protection_suspended = true;
        self.state.countdown_active = false;
        self.state.remaining_seconds = 0;
        self.state.low_battery_warned = false;
        vec![Action::CloseCountdown]
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Whether an armed countdown is currently inside the visible window.
    pub fn countdown_visible(&self) -> bool {
        self.state.countdown_active
            && self.state.remaining_seconds <= self.thresholds.warning_visible_below_secs
    }

    #[cfg(test)]
    fn with_state(thresholds: Thresholds, state: CoordinatorState) -> Self {
        Self { thresholds, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> ShutdownCoordinator {
        ShutdownCoordinator::new(Thresholds::default())
    }

    fn discharging(soc: u8) -> Sample {
        Sample::new(soc, -0.5)
    }

    fn charging(soc: u8) -> Sample {
        Sample::new(soc, 0.1)
    }

    fn notices(actions: &[Action]) -> usize {
        actions.iter().filter(|a| matches!(a, Action::Notify(_))).count()
    }

    #[test]
    fn charging_always_clears_countdown_and_suspension() {
        let priors = [
            CoordinatorState::default(),
            CoordinatorState { countdown_active: true, remaining_seconds: 17, ..Default::default() },
            CoordinatorState { protection_suspended: true, ..Default::default() },
            CoordinatorState {
                low_battery_warned: true,
                countdown_active: true,
                remaining_seconds: 3,
                protection_suspended: true,
                expired: false,
            },
        ];
        for prior in priors {
            for sample in [Sample::new(3, 0.0), Sample::new(50, 2.0), Sample::new(100, 0.01)] {
                let mut c = ShutdownCoordinator::with_state(Thresholds::default(), prior);
                c.on_sample(sample);
                assert!(!c.state().countdown_active, "prior {prior:?}, sample {sample:?}");
                assert!(!c.state().protection_suspended, "prior {prior:?}, sample {sample:?}");
            }
        }
    }

    #[test]
    fn discharging_above_low_is_silent() {
        for prior_warned in [false, true] {
            let mut c = ShutdownCoordinator::with_state(
                Thresholds::default(),
                CoordinatorState { low_battery_warned: prior_warned, ..Default::default() },
            );
            let actions = c.on_sample(discharging(21));
            assert!(actions.is_empty());
            assert!(!c.state().low_battery_warned);
        }
    }

    #[test]
    fn low_battery_notice_fires_once_per_excursion() {
        let mut c = coordinator();
        let first = c.on_sample(discharging(15));
        let second = c.on_sample(discharging(15));
        assert_eq!(first, vec![Action::Notify(Notice::LowBattery { state_of_charge: 15 })]);
        assert!(second.is_empty());
        assert_eq!(c.phase(), Phase::LowWarned);

        // Recovery above the threshold ends the excursion.
        c.on_sample(charging(25));
        assert_eq!(notices(&c.on_sample(discharging(19))), 1);
    }

    #[test]
    fn charging_below_low_keeps_warning() {
        let mut c = coordinator();
        c.on_sample(discharging(15));
        c.on_sample(charging(16));
        assert!(c.state().low_battery_warned);
        assert!(c.on_sample(discharging(15)).is_empty());
    }

    #[test]
    fn arming_is_idempotent() {
        let mut c = coordinator();
        let first = c.on_sample(discharging(3));
        assert_eq!(first, vec![Action::ShowCountdown { initial_seconds: 60 }]);
        c.on_tick();
        c.on_tick();
        assert_eq!(c.state().remaining_seconds, 58);

        let second = c.on_sample(discharging(3));
        assert!(second.is_empty());
        assert_eq!(c.state().remaining_seconds, 58);
        assert_eq!(c.phase(), Phase::CountdownArmed);
    }

    #[test]
    fn snooze_adds_time() {
        let mut c = ShutdownCoordinator::with_state(
            Thresholds::default(),
            CoordinatorState { countdown_active: true, remaining_seconds: 10, ..Default::default() },
        );
        let actions = c.on_snooze();
        assert_eq!(c.state().remaining_seconds, 310);
        assert_eq!(
            actions,
            vec![Action::UpdateCountdown { seconds_left: 310, visible: false }]
        );
        assert!(c.state().countdown_active);
    }

    #[test]
    fn snooze_without_countdown_is_ignored() {
        let mut c = coordinator();
        assert!(c.on_snooze().is_empty());
        assert_eq!(c.state().remaining_seconds, 0);
    }

    #[test]
    fn cancel_suspends_until_power_returns() {
        let mut c = coordinator();
        assert_eq!(c.on_sample(discharging(3)).len(), 1);

        assert_eq!(c.on_cancel(), vec![Action::CloseCountdown]);
        assert_eq!(c.phase(), Phase::Suspended);

        // Still discharging: nothing re-arms, nothing warns.
        assert!(c.on_sample(discharging(3)).is_empty());
        assert!(c.on_sample(discharging(12)).is_empty());

        // Power back: suspension lifted.
        c.on_sample(charging(3));
        assert!(!c.state().protection_suspended);

        // Next outage re-arms.
        assert_eq!(
            c.on_sample(discharging(3)),
            vec![Action::ShowCountdown { initial_seconds: 60 }]
        );
    }

    #[test]
    fn tick_hides_surface_above_visible_window() {
        let mut c = coordinator();
        c.on_sample(discharging(3));
        c.on_snooze(); // 360s left
        let actions = c.on_tick();
        assert_eq!(
            actions,
            vec![Action::UpdateCountdown { seconds_left: 360, visible: false }]
        );
        assert!(!c.countdown_visible());
        assert_eq!(c.state().remaining_seconds, 359);
    }

    #[test]
    fn tick_shows_surface_inside_visible_window() {
        let mut c = coordinator();
        c.on_sample(discharging(3));
        assert_eq!(
            c.on_tick(),
            vec![Action::UpdateCountdown { seconds_left: 60, visible: true }]
        );
        assert!(c.countdown_visible());
    }

    #[test]
    fn tick_without_countdown_closes_surface() {
        let mut c = coordinator();
        assert_eq!(c.on_tick(), vec![Action::CloseCountdown]);
    }

    #[test]
    fn expiry_is_terminal() {
        let mut c = ShutdownCoordinator::with_state(
            Thresholds::default(),
            CoordinatorState { countdown_active: true, remaining_seconds: 1, ..Default::default() },
        );
        let mut all = Vec::new();
        for _ in 0..5 {
            all.extend(c.on_tick());
        }
        let shutdowns = all.iter().filter(|a| **a == Action::ShutdownNow).count();
        assert_eq!(shutdowns, 1);
        assert!(c.state().expired);
        assert!(!c.state().countdown_active);

        // Nothing revives an expired coordinator.
        assert!(c.on_sample(charging(80)).is_empty());
        assert!(c.on_snooze().is_empty());
        assert!(c.on_cancel().is_empty());
        assert!(c.on_tick().is_empty());
    }

    #[test]
    fn expiry_closes_surface_before_shutdown() {
        let mut c = ShutdownCoordinator::with_state(
            Thresholds::default(),
            CoordinatorState { countdown_active: true, remaining_seconds: 0, ..Default::default() },
        );
        assert_eq!(
            c.on_tick(),
            vec![
                Action::UpdateCountdown { seconds_left: 0, visible: true },
                Action::CloseCountdown,
                Action::ShutdownNow,
            ]
        );
    }

    #[test]
    fn power_restored_mid_countdown() {
        let mut c = coordinator();
        assert_eq!(notices(&c.on_sample(discharging(18))), 1);
        assert_eq!(
            c.on_sample(discharging(4)),
            vec![Action::ShowCountdown { initial_seconds: 60 }]
        );
        assert_eq!(c.state().remaining_seconds, 60);

        let actions = c.on_sample(Sample::new(4, 0.1));
        assert_eq!(
            actions,
            vec![Action::Notify(Notice::PowerRestored), Action::CloseCountdown]
        );
        assert_eq!(c.state().remaining(), None);
        assert!(!c.on_tick().contains(&Action::ShutdownNow));
    }
}
