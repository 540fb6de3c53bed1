//! go-eCharger command translation and publishing.
//!
//! Commands are fire-and-forget: the charger's acknowledgement is never
//! awaited and a failed publish is logged, not retried.

use crate::config::ControlsConfig;
use crate::error::Result;
use crate::logging::get_logger;
use crate::topics::ChargerTopics;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Value of the charger's `frc` (force state) key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceState {
    Off = 1,
    On = 2,
}

/// Value of the charger's `psm` (phase switch mode) key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseMode {
    Single = 1,
    Three = 2,
}

/// A single charger-native control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerCommand {
    Force(ForceState),
    Phases(PhaseMode),
    MaxCurrent(i64),
}

impl ChargerCommand {
    /// Enable or disable charging
    pub fn enable(on: bool) -> Self {
        ChargerCommand::Force(if on { ForceState::On } else { ForceState::Off })
    }

    /// Topic and payload this command is published as
    pub fn to_message(&self, topics: &ChargerTopics) -> (String, String) {
        match self {
            ChargerCommand::Force(state) => (topics.frc.clone(), (*state as u8).to_string()),
            ChargerCommand::Phases(mode) => (topics.psm.clone(), (*mode as u8).to_string()),
            ChargerCommand::MaxCurrent(amps) => (topics.amp.clone(), amps.to_string()),
        }
    }
}

/// Limits for converting a power level into a current setting
#[derive(Debug, Clone, Copy)]
pub struct PhaseLimits {
    pub line_voltage: i64,
    pub max_single_phase_amps: i64,
}

impl PhaseLimits {
    pub fn from_config(controls: &ControlsConfig) -> Self {
        Self {
            line_voltage: controls.line_voltage,
            max_single_phase_amps: controls.max_single_phase_amps,
        }
    }
}

impl Default for PhaseLimits {
    fn default() -> Self {
        Self::from_config(&ControlsConfig::default())
    }
}

/// Phase mode and current for a power level.
///
/// Above the single-phase limit the current is split over three phases with
/// truncating division. The charger's minimum current is applied last.
pub fn charge_power_commands(
    power_w: i64,
    min_amps: i32,
    limits: &PhaseLimits,
) -> [ChargerCommand; 2] {
    let mut amps = power_w / limits.line_voltage;
    let mut phases = PhaseMode::Single;

    if amps > limits.max_single_phase_amps {
        phases = PhaseMode::Three;
        amps /= 3;
    }

    amps = amps.max(i64::from(min_amps));

    [
        ChargerCommand::Phases(phases),
        ChargerCommand::MaxCurrent(amps),
    ]
}

/// Destination for charger commands
#[async_trait]
pub trait ChargerSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// Publishes commands to the charger topics, logging failures
pub struct CommandEmitter<S> {
    topics: ChargerTopics,
    sink: S,
    logger: crate::logging::StructuredLogger,
}

impl<S: ChargerSink> CommandEmitter<S> {
    pub fn new(topics: ChargerTopics, sink: S) -> Self {
        Self {
            topics,
            sink,
            logger: get_logger("charger"),
        }
    }

    pub async fn emit(&self, command: &ChargerCommand) {
        let (topic, payload) = command.to_message(&self.topics);
        self.logger.debug(&format!("Publishing {} <- {}", topic, payload));
        if let Err(e) = self.sink.publish(&topic, &payload).await {
            self.logger.warn(&format!("Publish {}={} failed: {}", topic, payload, e));
        }
    }

    pub async fn emit_all(&self, commands: &[ChargerCommand]) {
        for command in commands {
            self.emit(command).await;
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// In-memory sink that records every published message
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published `(topic, payload)` pairs in order
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Drain and return everything published so far
    pub fn take(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChargerSink for RecordingSink {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        if let Ok(mut m) = self.messages.lock() {
            m.push((topic.to_string(), payload.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_phase_within_limit() {
        let cmds = charge_power_commands(3000, 6, &PhaseLimits::default());
        assert_eq!(
            cmds,
            [
                ChargerCommand::Phases(PhaseMode::Single),
                ChargerCommand::MaxCurrent(13)
            ]
        );
    }

    #[test]
    fn three_phase_truncates() {
        let cmds = charge_power_commands(5000, 6, &PhaseLimits::default());
        assert_eq!(
            cmds,
            [
                ChargerCommand::Phases(PhaseMode::Three),
                ChargerCommand::MaxCurrent(7)
            ]
        );
    }

    #[test]
    fn clamps_to_minimum_current() {
        let cmds = charge_power_commands(500, 6, &PhaseLimits::default());
        assert_eq!(cmds[1], ChargerCommand::MaxCurrent(6));

        // 17 A -> 5 A on three phases, then clamped
        let cmds = charge_power_commands(17 * 230, 6, &PhaseLimits::default());
        assert_eq!(
            cmds,
            [
                ChargerCommand::Phases(PhaseMode::Three),
                ChargerCommand::MaxCurrent(6)
            ]
        );
    }

    #[test]
    fn sixteen_amps_stays_single_phase() {
        let cmds = charge_power_commands(16 * 230 + 229, 6, &PhaseLimits::default());
        assert_eq!(cmds[0], ChargerCommand::Phases(PhaseMode::Single));
        assert_eq!(cmds[1], ChargerCommand::MaxCurrent(16));
    }

    #[test]
    fn command_messages() {
        let topics = ChargerTopics::new("go-eCharger", "1");
        assert_eq!(
            ChargerCommand::enable(true).to_message(&topics),
            ("go-eCharger/1/frc".to_string(), "2".to_string())
        );
        assert_eq!(
            ChargerCommand::enable(false).to_message(&topics),
            ("go-eCharger/1/frc".to_string(), "1".to_string())
        );
        assert_eq!(
            ChargerCommand::Phases(PhaseMode::Three).to_message(&topics),
            ("go-eCharger/1/psm".to_string(), "2".to_string())
        );
        assert_eq!(
            ChargerCommand::MaxCurrent(10).to_message(&topics),
            ("go-eCharger/1/amp".to_string(), "10".to_string())
        );
    }

    #[tokio::test]
    async fn emitter_publishes_in_order() {
        let sink = RecordingSink::new();
        let emitter = CommandEmitter::new(ChargerTopics::new("go-eCharger", "7"), sink.clone());
        emitter
            .emit_all(&charge_power_commands(5000, 6, &PhaseLimits::default()))
            .await;
        assert_eq!(
            sink.take(),
            vec![
                ("go-eCharger/7/psm".to_string(), "2".to_string()),
                ("go-eCharger/7/amp".to_string(), "7".to_string()),
            ]
        );
        assert!(sink.messages().is_empty());
    }
}
