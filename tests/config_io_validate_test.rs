use std::fs;
use surplusd::config::Config;

fn valid() -> Config {
    let mut cfg = Config::default();
    cfg.charger.serial = "203456".to_string();
    cfg
}

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("surplusd.yaml");

    let mut cfg = valid();
    cfg.mqtt.host = "10.0.0.5".to_string();
    cfg.controls.min_power_w = 1400;
    cfg.logging.file = Some(path.with_extension("log").to_string_lossy().to_string());

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.mqtt.host, "10.0.0.5");
    assert_eq!(loaded.charger.serial, "203456");
    assert_eq!(loaded.controls.min_power_w, 1400);
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn json_file_is_parsed_as_json() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"mqtt": {"host": "broker.lan", "port": 8883}, "charger": {"serial": "99"}}"#,
    )
    .unwrap();

    let cfg = Config::from_file(&path).unwrap();
    assert_eq!(cfg.mqtt.host, "broker.lan");
    assert_eq!(cfg.mqtt.port, 8883);
    assert_eq!(cfg.charger.serial, "99");
    assert_eq!(cfg.charger.topic_prefix, "go-eCharger");
}

#[test]
fn legacy_rc_file_is_understood() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join(".energydrc");
    fs::write(
        &path,
        r#"{
            "Mqtt_host": "192.168.1.10",
            "Mqtt_port": "1884",
            "Mqtt_user": "energy",
            "Mqtt_pass": "secret",
            "Goe_serial": "203456"
        }"#,
    )
    .unwrap();

    let cfg = Config::from_file(&path).unwrap();
    assert_eq!(cfg.mqtt.host, "192.168.1.10");
    assert_eq!(cfg.mqtt.port, 1884);
    assert_eq!(cfg.mqtt.username, "energy");
    assert_eq!(cfg.mqtt.password, "secret");
    assert_eq!(cfg.charger.serial, "203456");
    assert!(cfg.validate().is_ok());
}

#[test]
fn invalid_yaml_is_a_serialization_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("broken.yaml");
    fs::write(&path, "mqtt: [unclosed").unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Serialization error"));
}

#[test]
fn missing_file_is_an_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(tmp_dir.path().join("nope.yaml")).unwrap_err();
    assert!(err.to_string().contains("Could not read"));
}

#[test]
fn config_validation_errors() {
    assert!(valid().validate().is_ok());

    // Default has no charger serial
    assert!(Config::default().validate().is_err());

    let mut cfg = valid();
    cfg.mqtt.host.clear();
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.mqtt.port = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.charger.serial = "12/34".to_string();
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.controls.ema_alpha = 0.0;
    assert!(cfg.validate().is_err());
    cfg.controls.ema_alpha = 1.5;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.controls.line_voltage = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.controls.fast_window_seconds = 600;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.logging.level = "LOUD".to_string();
    assert!(cfg.validate().is_err());
}
