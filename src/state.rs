//! Energy state shared by the estimator and the decision engine.
//!
//! The driver owns exactly one `EnergyState` and hands it out by `&mut`,
//! so every update happens on a single logical worker.

use std::time::{Duration, Instant};

/// Charger activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargerState {
    #[default]
    Inactive,
    Active,
}

impl ChargerState {
    pub fn is_active(self) -> bool {
        matches!(self, ChargerState::Active)
    }
}

/// Latest readings plus decision bookkeeping
#[derive(Debug, Clone)]
pub struct EnergyState {
    /// Home battery state of charge (%)
    pub battery_percent: i32,
    /// PV string 1 power (W)
    pub solar_power_1: i32,
    /// PV string 2 power (W)
    pub solar_power_2: i32,
    /// Total house power at the meter, charger included (W)
    pub house_power: f64,
    /// Minimum current the charger accepts (A)
    pub min_amps: i32,
    /// Power the charger reports drawing (W)
    pub charger_reported_power: i32,
    /// EMA of the available surplus (W)
    pub smoothed_surplus: f64,

    committed_power: i64,
    last_change: Option<Instant>,
    charger: ChargerState,
}

impl EnergyState {
    pub fn new(default_min_amps: i32) -> Self {
        Self {
            battery_percent: 0,
            solar_power_1: 0,
            solar_power_2: 0,
            house_power: 0.0,
            min_amps: default_min_amps,
            charger_reported_power: 0,
            smoothed_surplus: 0.0,
            committed_power: 0,
            last_change: None,
            charger: ChargerState::Inactive,
        }
    }

    /// Surplus that would be available if the charger drew nothing
    pub fn instantaneous_surplus(&self) -> f64 {
        f64::from(self.solar_power_1) + f64::from(self.solar_power_2) - self.house_power
            + f64::from(self.charger_reported_power)
    }

    /// Power level last commanded to the charger (W)
    pub fn committed_power(&self) -> i64 {
        self.committed_power
    }

    pub fn last_change(&self) -> Option<Instant> {
        self.last_change
    }

    pub fn charger(&self) -> ChargerState {
        self.charger
    }

    /// Time since the last commanded change; `None` if nothing was ever commanded
    pub fn since_last_change(&self, now: Instant) -> Option<Duration> {
        self.last_change.map(|at| now.saturating_duration_since(at))
    }

    /// Record a new commanded power level together with its timestamp
    pub(crate) fn commit(&mut self, power_w: i64, now: Instant) {
        self.committed_power = power_w;
        self.last_change = Some(now);
    }

    pub(crate) fn set_charger(&mut self, state: ChargerState) {
        self.charger = state;
    }
}

impl Default for EnergyState {
    fn default() -> Self {
        Self::new(6)
    }
}
