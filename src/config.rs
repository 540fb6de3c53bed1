//! Configuration management for surplusd
//!
//! The configuration is read once at startup. YAML is the native format;
//! `.json` files and the legacy flat `.energydrc` JSON file are accepted too.

use crate::error::{Result, SurplusError};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "SURPLUSD_CONFIG";

/// File name of the legacy flat JSON configuration
pub const LEGACY_RC_FILE: &str = ".energydrc";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MQTT broker connection
    pub mqtt: MqttConfig,

    /// Charger identity and topic namespace
    pub charger: ChargerConfig,

    /// Inbound telemetry topics not owned by the charger
    pub topics: TopicsConfig,

    /// Surplus estimation and hysteresis tuning
    pub controls: ControlsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// MQTT broker connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name or IP address
    pub host: String,

    /// Broker TCP port (typically 1883)
    pub port: u16,

    /// Optional user name; empty disables authentication
    pub username: String,

    /// Password for `username`
    pub password: String,

    /// Client identifier presented to the broker
    pub client_id: String,

    /// Keep-alive interval in seconds
    pub keep_alive_seconds: u64,

    /// How long to wait for the initial CONNACK before giving up
    pub connect_timeout_seconds: u64,

    /// Pause between event loop polls after a transport error
    pub reconnect_delay_ms: u64,
}

/// go-eCharger identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerConfig {
    /// Serial number substituted into the charger topic namespace
    pub serial: String,

    /// Topic prefix of the charger's MQTT API
    pub topic_prefix: String,
}

/// Inbound household telemetry topics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Home battery state of charge in percent
    pub battery_capacity: String,

    /// First PV string power in watts
    pub solar_input_1: String,

    /// Second PV string power in watts
    pub solar_input_2: String,

    /// Total house power at the meter in watts, including the charger
    pub meter_power: String,
}

/// Surplus estimation and charge decision tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// EMA smoothing factor applied to the instantaneous surplus (0..1]
    pub ema_alpha: f64,

    /// Surplus is only tracked while the home battery is above this level
    pub battery_threshold_percent: i32,

    /// Power of the smallest charge step in watts (6 A at 230 V)
    pub min_power_w: i64,

    /// Dead time after a change; large swings (2x `min_power_w`) act after this
    pub fast_window_seconds: u64,

    /// Small swings (1x `min_power_w`) must persist this long before acting
    pub slow_window_seconds: u64,

    /// Nominal line voltage used for watt to ampere conversion
    pub line_voltage: i64,

    /// Above this current the charger is switched to three phases
    pub max_single_phase_amps: i64,

    /// Minimum charger current until the charger reports its own
    pub default_min_amps: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Log file path or directory; console only when unset
    pub file: Option<String>,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Legacy flat JSON configuration (`~/.energydrc`)
#[derive(Debug, Deserialize)]
struct LegacyRc {
    #[serde(rename = "Mqtt_host", alias = "mqtt_host")]
    mqtt_host: String,
    #[serde(rename = "Mqtt_port", alias = "mqtt_port")]
    mqtt_port: serde_json::Value,
    #[serde(rename = "Mqtt_user", alias = "mqtt_user", default)]
    mqtt_user: String,
    #[serde(rename = "Mqtt_pass", alias = "mqtt_pass", default)]
    mqtt_pass: String,
    #[serde(rename = "Goe_serial", alias = "goe_serial")]
    goe_serial: String,
}

impl LegacyRc {
    fn into_config(self) -> Result<Config> {
        let port = match &self.mqtt_port {
            serde_json::Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            serde_json::Value::String(s) => s.trim().parse::<u16>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            SurplusError::validation("Mqtt_port", "must be a port number between 1 and 65535")
        })?;

        let mut config = Config::default();
        config.mqtt.host = self.mqtt_host;
        config.mqtt.port = port;
        config.mqtt.username = self.mqtt_user;
        config.mqtt.password = self.mqtt_pass;
        config.charger.serial = self.goe_serial;
        Ok(config)
    }
}

impl Config {
    /// Load configuration from a file, picking the parser from its name
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SurplusError::config(format!("Could not read {}: {}", path.display(), e))
        })?;

        let is_legacy = path.file_name().and_then(|n| n.to_str()) == Some(LEGACY_RC_FILE);
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_legacy {
            let rc: LegacyRc = serde_json::from_str(&contents)?;
            rc.into_config()
        } else if is_json {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(serde_yaml::from_str(&contents)?)
        }
    }

    /// Locate and load the configuration file.
    ///
    /// Order: `SURPLUSD_CONFIG`, then the default search paths. A missing file
    /// is an error; the daemon never runs on built-in defaults alone.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(path);
        }

        let default_paths = ["surplusd.yaml", LEGACY_RC_FILE, "/etc/surplusd/config.yaml"];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Err(SurplusError::config(format!(
            "No configuration file found (tried {})",
            default_paths.join(", ")
        )))
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.host.trim().is_empty() {
            return Err(SurplusError::validation(
                "mqtt.host",
                "Host cannot be empty",
            ));
        }

        if self.mqtt.port == 0 {
            return Err(SurplusError::validation(
                "mqtt.port",
                "Port must be greater than 0",
            ));
        }

        if self.mqtt.client_id.is_empty() {
            return Err(SurplusError::validation(
                "mqtt.client_id",
                "Client id cannot be empty",
            ));
        }

        if self.charger.serial.trim().is_empty() {
            return Err(SurplusError::validation(
                "charger.serial",
                "Serial number cannot be empty",
            ));
        }

        if self.charger.serial.contains(['/', '+', '#']) {
            return Err(SurplusError::validation(
                "charger.serial",
                "Serial number must not contain MQTT topic separators or wildcards",
            ));
        }

        let c = &self.controls;
        if !(c.ema_alpha > 0.0 && c.ema_alpha <= 1.0) {
            return Err(SurplusError::validation(
                "controls.ema_alpha",
                "Must be in (0, 1]",
            ));
        }

        if c.min_power_w <= 0 {
            return Err(SurplusError::validation(
                "controls.min_power_w",
                "Must be positive",
            ));
        }

        if c.line_voltage <= 0 {
            return Err(SurplusError::validation(
                "controls.line_voltage",
                "Must be positive",
            ));
        }

        if c.max_single_phase_amps <= 0 {
            return Err(SurplusError::validation(
                "controls.max_single_phase_amps",
                "Must be positive",
            ));
        }

        if c.fast_window_seconds > c.slow_window_seconds {
            return Err(SurplusError::validation(
                "controls.fast_window_seconds",
                "Must not exceed controls.slow_window_seconds",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)?;

        Ok(())
    }
}
