//! MQTT topic names, resolved once at startup and immutable afterwards.

use crate::config::Config;

/// What an inbound topic carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    BatteryCapacity,
    SolarInput1,
    SolarInput2,
    MeterPower,
    ChargerMinAmps,
    ChargerEnergy,
}

/// Topics of one go-eCharger's MQTT API (`<prefix>/<serial>/<key>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargerTopics {
    /// Allowed current in amperes (published)
    pub amp: String,
    /// Force state: 1 = off, 2 = on (published)
    pub frc: String,
    /// Phase switch mode: 1 = single, 2 = three phases (published)
    pub psm: String,
    /// Energy record, comma separated (consumed)
    pub nrg: String,
    /// Minimum charging current in amperes (consumed)
    pub mca: String,
}

impl ChargerTopics {
    pub fn new(prefix: &str, serial: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let topic = |key: &str| format!("{}/{}/{}", prefix, serial, key);
        Self {
            amp: topic("amp"),
            frc: topic("frc"),
            psm: topic("psm"),
            nrg: topic("nrg"),
            mca: topic("mca"),
        }
    }
}

/// Complete topic map of the daemon
#[derive(Debug, Clone)]
pub struct TopicMap {
    inbound: Vec<(String, TopicKind)>,
    charger: ChargerTopics,
}

impl TopicMap {
    pub fn from_config(config: &Config) -> Self {
        let charger = ChargerTopics::new(&config.charger.topic_prefix, &config.charger.serial);
        let t = &config.topics;
        let inbound = vec![
            (t.battery_capacity.clone(), TopicKind::BatteryCapacity),
            (t.solar_input_1.clone(), TopicKind::SolarInput1),
            (t.solar_input_2.clone(), TopicKind::SolarInput2),
            (t.meter_power.clone(), TopicKind::MeterPower),
            (charger.mca.clone(), TopicKind::ChargerMinAmps),
            (charger.nrg.clone(), TopicKind::ChargerEnergy),
        ];
        Self { inbound, charger }
    }

    /// Classify an inbound topic; `None` for topics we never subscribed to
    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        self.inbound
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, kind)| *kind)
    }

    /// All topics to subscribe to
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.inbound.iter().map(|(t, _)| t.as_str())
    }

    pub fn charger(&self) -> &ChargerTopics {
        &self.charger
    }
}
