//! Charge decision engine.
//!
//! Turns the smoothed surplus into charger commands with two layers of
//! damping:
//!
//! - **Dead time**: nothing changes within `fast_window` of the last change.
//! - **Dual hysteresis band**: a swing of at least `2 * min_power` acts once
//!   the fast window has passed, a swing of at least `min_power` only once the
//!   slow window has passed.
//!
//! On/off thresholds sit asymmetrically around `min_power` (off at or below
//! half of it, on at or above one and a half times it) so the charger does
//! not flap near the boundary.

use crate::charger::{ChargerCommand, PhaseLimits, charge_power_commands};
use crate::config::ControlsConfig;
use crate::logging::get_logger;
use crate::state::{ChargerState, EnergyState};
use std::time::{Duration, Instant};

/// Outcome of a decision step that committed a new power level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Newly committed power level (W)
    pub power_w: i64,

    /// Charger state entered by this step, if it changed
    pub transition: Option<ChargerState>,

    /// Commands to send, in order
    pub commands: Vec<ChargerCommand>,
}

/// Time-gated hysteresis controller
pub struct ChargeController {
    min_power_w: i64,
    fast_window: Duration,
    slow_window: Duration,
    limits: PhaseLimits,
    logger: crate::logging::StructuredLogger,
}

impl ChargeController {
    pub fn new(controls: &ControlsConfig) -> Self {
        Self {
            min_power_w: controls.min_power_w,
            fast_window: Duration::from_secs(controls.fast_window_seconds),
            slow_window: Duration::from_secs(controls.slow_window_seconds),
            limits: PhaseLimits::from_config(controls),
            logger: get_logger("controls"),
        }
    }

    /// Committed power at or below which an active charger is switched off
    pub fn switch_off_threshold(&self) -> i64 {
        self.min_power_w / 2
    }

    /// Committed power at or above which an inactive charger is switched on
    pub fn switch_on_threshold(&self) -> i64 {
        self.min_power_w * 3 / 2
    }

    /// Whether a deviation of `diff` watts warrants a change after `elapsed`.
    ///
    /// `None` means no change was ever committed, which passes every window.
    pub fn should_change(&self, elapsed: Option<Duration>, diff: f64) -> bool {
        let passed = |window: Duration| elapsed.is_none_or(|e| e >= window);
        let min = self.min_power_w as f64;

        let fast_band = passed(self.fast_window) && diff >= 2.0 * min;
        let slow_band = passed(self.slow_window) && diff >= min;
        fast_band || slow_band
    }

    /// Run one decision step against the freshly smoothed surplus.
    ///
    /// Returns `None` when nothing was committed; `state` is then untouched.
    pub fn evaluate(&self, state: &mut EnergyState, now: Instant) -> Option<Decision> {
        let elapsed = state.since_last_change(now);
        if elapsed.is_some_and(|e| e < self.fast_window) {
            return None;
        }

        let diff = (state.committed_power() as f64 - state.smoothed_surplus).abs();
        if !self.should_change(elapsed, diff) {
            return None;
        }

        // truncates toward zero
        let power_w = state.smoothed_surplus as i64;
        state.commit(power_w, now);
        self.logger.info(&format!("Change to {}", power_w));

        let mut commands = Vec::with_capacity(3);
        let mut transition = None;

        match state.charger() {
            ChargerState::Active if power_w <= self.switch_off_threshold() => {
                self.logger.info("Switch OFF");
                state.set_charger(ChargerState::Inactive);
                transition = Some(ChargerState::Inactive);
                commands.push(ChargerCommand::enable(false));
            }
            ChargerState::Inactive if power_w >= self.switch_on_threshold() => {
                self.logger.info("Switch ON");
                state.set_charger(ChargerState::Active);
                transition = Some(ChargerState::Active);
                commands.push(ChargerCommand::enable(true));
            }
            _ => {}
        }

        if state.charger().is_active() && power_w >= 0 {
            self.logger.info(&format!("Set charge power to {}", power_w));
            commands.extend(charge_power_commands(power_w, state.min_amps, &self.limits));
        }

        Some(Decision {
            power_w,
            transition,
            commands,
        })
    }
}

impl Default for ChargeController {
    fn default() -> Self {
        Self::new(&ControlsConfig::default())
    }
}
