use super::*;

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "surplusd".to_string(),
            keep_alive_seconds: 5,
            connect_timeout_seconds: 10,
            reconnect_delay_ms: 1000,
        }
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            serial: String::new(),
            topic_prefix: "go-eCharger".to_string(),
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            battery_capacity: "pv/inverter/battery/capacity".to_string(),
            solar_input_1: "pv/inverter/solar_input1/power".to_string(),
            solar_input_2: "pv/inverter/solar_input2/power".to_string(),
            meter_power: "smartmeter/power/total".to_string(),
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.05,
            battery_threshold_percent: 90,
            min_power_w: 1380,
            fast_window_seconds: 60,
            slow_window_seconds: 300,
            line_voltage: 230,
            max_single_phase_amps: 16,
            default_min_amps: 6,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: None,
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            charger: ChargerConfig::default(),
            topics: TopicsConfig::default(),
            controls: ControlsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
