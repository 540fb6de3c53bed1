use std::time::Instant;
use surplusd::charger::RecordingSink;
use surplusd::config::Config;
use surplusd::driver::EnergyDriver;
use surplusd::telemetry::TelemetryMessage;

const BATTERY: &str = "pv/inverter/battery/capacity";
const SOLAR_1: &str = "pv/inverter/solar_input1/power";
const SOLAR_2: &str = "pv/inverter/solar_input2/power";
const METER: &str = "smartmeter/power/total";
const NRG: &str = "go-eCharger/203456/nrg";
const MCA: &str = "go-eCharger/203456/mca";

fn driver() -> EnergyDriver<RecordingSink> {
    let mut config = Config::default();
    config.charger.serial = "203456".to_string();
    EnergyDriver::new(&config, RecordingSink::new())
}

async fn send(d: &mut EnergyDriver<RecordingSink>, topic: &str, payload: &str) {
    let msg = TelemetryMessage::new(topic, payload);
    d.handle_message_at(&msg, Instant::now()).await;
}

#[tokio::test]
async fn garbage_keeps_previous_values() {
    let mut d = driver();
    send(&mut d, BATTERY, "93").await;
    send(&mut d, SOLAR_1, "1200").await;
    send(&mut d, SOLAR_2, "800").await;
    send(&mut d, MCA, "8").await;
    send(&mut d, NRG, "0,0,0,0,0,0,0,0,0,0,0,1500").await;

    for topic in [BATTERY, SOLAR_1, SOLAR_2, MCA, NRG, METER] {
        send(&mut d, topic, "abc").await;
    }

    let s = d.state();
    assert_eq!(s.battery_percent, 93);
    assert_eq!(s.solar_power_1, 1200);
    assert_eq!(s.solar_power_2, 800);
    assert_eq!(s.min_amps, 8);
    assert_eq!(s.charger_reported_power, 1500);
    assert_eq!(s.house_power, 0.0);
    assert!(d.sink().messages().is_empty());
}

#[tokio::test]
async fn short_energy_record_is_ignored() {
    let mut d = driver();
    send(&mut d, NRG, "0,0,0,0,0,0,0,0,0,0,0,2200").await;
    send(&mut d, NRG, "1,2,3,4,5").await;
    assert_eq!(d.state().charger_reported_power, 2200);
}

#[tokio::test]
async fn malformed_meter_reading_runs_no_estimator_step() {
    let mut d = driver();
    send(&mut d, BATTERY, "95").await;
    send(&mut d, SOLAR_1, "5000").await;
    send(&mut d, METER, "1000").await;
    let smoothed = d.state().smoothed_surplus;
    assert!((smoothed - 200.0).abs() < 1e-9);

    send(&mut d, METER, "").await;
    send(&mut d, METER, "1e999").await;
    assert_eq!(d.state().smoothed_surplus, smoothed);
    assert_eq!(d.state().house_power, 1000.0);
}

#[tokio::test]
async fn fractional_meter_readings_are_accepted() {
    let mut d = driver();
    send(&mut d, METER, " -312.75\n").await;
    assert_eq!(d.state().house_power, -312.75);
}
