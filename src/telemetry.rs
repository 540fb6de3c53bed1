//! Telemetry payload decoding.
//!
//! Sensor telemetry is lossy: a garbled frame must never disturb the control
//! loop. Every parser here returns `Option` and callers drop `None` on the
//! floor, leaving the previous reading in place.

use crate::state::EnergyState;
use crate::topics::TopicKind;

/// Field of the go-eCharger `nrg` record holding the total charging power (W)
pub const NRG_POWER_FIELD: usize = 11;

/// Inbound MQTT message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage {
    pub topic: String,
    pub payload: String,
}

impl TelemetryMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// A decoded reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    BatteryPercent(i32),
    SolarPower1(i32),
    SolarPower2(i32),
    HousePower(f64),
    MinAmps(i32),
    ChargerPower(i32),
}

impl Reading {
    /// Decode `payload` as the reading carried by `kind`
    pub fn parse(kind: TopicKind, payload: &str) -> Option<Self> {
        match kind {
            TopicKind::BatteryCapacity => parse_int(payload).map(Reading::BatteryPercent),
            TopicKind::SolarInput1 => parse_int(payload).map(Reading::SolarPower1),
            TopicKind::SolarInput2 => parse_int(payload).map(Reading::SolarPower2),
            TopicKind::MeterPower => parse_float(payload).map(Reading::HousePower),
            TopicKind::ChargerMinAmps => parse_int(payload).map(Reading::MinAmps),
            TopicKind::ChargerEnergy => parse_energy_record(payload).map(Reading::ChargerPower),
        }
    }

    /// Store the reading in its field of `state`
    pub fn apply(self, state: &mut EnergyState) {
        match self {
            Reading::BatteryPercent(v) => state.battery_percent = v,
            Reading::SolarPower1(v) => state.solar_power_1 = v,
            Reading::SolarPower2(v) => state.solar_power_2 = v,
            Reading::HousePower(v) => state.house_power = v,
            Reading::MinAmps(v) => state.min_amps = v,
            Reading::ChargerPower(v) => state.charger_reported_power = v,
        }
    }
}

pub fn parse_int(payload: &str) -> Option<i32> {
    payload.trim().parse().ok()
}

pub fn parse_float(payload: &str) -> Option<f64> {
    payload.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Extract the charging power from a comma separated `nrg` record.
///
/// Records with fewer than twelve fields are rejected.
pub fn parse_energy_record(payload: &str) -> Option<i32> {
    payload.split(',').nth(NRG_POWER_FIELD).and_then(parse_int)
}
