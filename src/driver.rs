//! Core driver logic for surplusd
//!
//! The driver exclusively owns the [`EnergyState`] and processes inbound
//! telemetry one message at a time. A meter power reading runs the surplus
//! estimator and then the decision engine; any resulting commands are sent
//! before the next message is taken from the mailbox.

use crate::charger::{ChargerSink, CommandEmitter};
use crate::config::Config;
use crate::controls::{ChargeController, Decision};
use crate::error::Result;
use crate::logging::{LogContext, get_logger_with_context};
use crate::state::EnergyState;
use crate::surplus::SurplusEstimator;
use crate::telemetry::{Reading, TelemetryMessage};
use crate::topics::{TopicKind, TopicMap};
use std::time::Instant;
use tokio::sync::mpsc;

/// Main driver for surplusd
pub struct EnergyDriver<S> {
    state: EnergyState,
    topics: TopicMap,
    estimator: SurplusEstimator,
    controller: ChargeController,
    emitter: CommandEmitter<S>,
    logger: crate::logging::StructuredLogger,
}

impl<S: ChargerSink> EnergyDriver<S> {
    /// Create a new driver publishing charger commands to `sink`
    pub fn new(config: &Config, sink: S) -> Self {
        let topics = TopicMap::from_config(config);
        let emitter = CommandEmitter::new(topics.charger().clone(), sink);
        let context = LogContext::new("driver").with_charger_serial(&config.charger.serial);
        let logger = get_logger_with_context(context);

        Self {
            state: EnergyState::new(config.controls.default_min_amps),
            topics,
            estimator: SurplusEstimator::from_config(&config.controls),
            controller: ChargeController::new(&config.controls),
            emitter,
            logger,
        }
    }

    pub fn state(&self) -> &EnergyState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        self.emitter.sink()
    }

    /// Process one inbound message at the current time
    pub async fn handle_message(&mut self, msg: &TelemetryMessage) -> Option<Decision> {
        self.handle_message_at(msg, Instant::now()).await
    }

    /// Process one inbound message as if it arrived at `now`.
    ///
    /// Returns the decision if this message caused a new power level to be
    /// committed.
    pub async fn handle_message_at(
        &mut self,
        msg: &TelemetryMessage,
        now: Instant,
    ) -> Option<Decision> {
        let Some(kind) = self.topics.classify(&msg.topic) else {
            self.logger.debug(&format!(
                "Ignoring message on unexpected topic {}",
                msg.topic
            ));
            return None;
        };

        // Lossy telemetry: a malformed frame keeps the previous value
        let Some(reading) = Reading::parse(kind, &msg.payload) else {
            self.logger.trace(&format!(
                "Ignoring malformed payload on {}: {:?}",
                msg.topic, msg.payload
            ));
            return None;
        };
        reading.apply(&mut self.state);

        if kind != TopicKind::MeterPower {
            return None;
        }

        let smoothed = self.estimator.update(&mut self.state);
        self.logger.debug(&format!("charge power float {:.6}", smoothed));

        let decision = self.controller.evaluate(&mut self.state, now)?;
        self.emitter.emit_all(&decision.commands).await;
        Some(decision)
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    pub async fn run(
        &mut self,
        mut messages: mpsc::Receiver<TelemetryMessage>,
        mut shutdown_rx: mpsc::UnboundedReceiver<()>,
    ) -> Result<()> {
        self.logger.info("Starting surplus charging driver");

        loop {
            tokio::select! {
                Some(msg) = messages.recv() => {
                    self.handle_message(&msg).await;
                }
                _ = shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        let committed = self.state.committed_power();
        let active = self.state.charger().is_active();
        self.logger.info(&format!(
            "Driver stopped (committed={} W, active={})",
            committed, active
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charger::RecordingSink;

    fn driver() -> EnergyDriver<RecordingSink> {
        let mut config = Config::default();
        config.charger.serial = "55".to_string();
        EnergyDriver::new(&config, RecordingSink::new())
    }

    #[tokio::test]
    async fn unknown_topic_is_ignored() {
        let mut d = driver();
        let before = d.state().clone();
        let msg = TelemetryMessage::new("some/other/topic", "5");
        assert!(d.handle_message(&msg).await.is_none());
        assert_eq!(d.state().battery_percent, before.battery_percent);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let mut d = driver();
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        let msg = TelemetryMessage::new("pv/inverter/battery/capacity", "97");
        tx.send(msg).await.unwrap();
        let handle = tokio::spawn(async move {
            d.run(rx, shutdown_rx).await.unwrap();
            d
        });

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown_tx.send(()).unwrap();
        let d = handle.await.unwrap();
        assert_eq!(d.state().battery_percent, 97);
    }
}
