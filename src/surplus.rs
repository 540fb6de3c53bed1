//! Surplus estimation.
//!
//! The meter reading includes whatever the charger draws, so the charger's own
//! reported power is added back to get the surplus that would exist with the
//! charger off. An EMA damps meter noise and short cloud dips. While the home
//! battery is at or below the threshold the estimate is pinned to zero, so the
//! house battery fills up before the car gets anything.

use crate::config::ControlsConfig;
use crate::state::EnergyState;

#[derive(Debug, Clone)]
pub struct SurplusEstimator {
    alpha: f64,
    battery_threshold_percent: i32,
}

impl SurplusEstimator {
    pub fn new(alpha: f64, battery_threshold_percent: i32) -> Self {
        Self {
            alpha,
            battery_threshold_percent,
        }
    }

    pub fn from_config(controls: &ControlsConfig) -> Self {
        Self::new(controls.ema_alpha, controls.battery_threshold_percent)
    }

    /// Fold the latest readings into `state.smoothed_surplus` and return it
    pub fn update(&self, state: &mut EnergyState) -> f64 {
        if state.battery_percent > self.battery_threshold_percent {
            let sample = state.instantaneous_surplus();
            state.smoothed_surplus += (sample - state.smoothed_surplus) * self.alpha;
        } else {
            state.smoothed_surplus = 0.0;
        }
        state.smoothed_surplus
    }
}

impl Default for SurplusEstimator {
    fn default() -> Self {
        Self::from_config(&ControlsConfig::default())
    }
}
