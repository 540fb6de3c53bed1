//! MQTT transport.
//!
//! Owns the rumqttc event loop in a background task and forwards every
//! publish as a [`TelemetryMessage`]. Reconnects are left to rumqttc; we keep
//! polling after errors and re-subscribe when the broker lost our session.

use crate::charger::ChargerSink;
use crate::config::MqttConfig;
use crate::error::{Result, SurplusError};
use crate::logging::get_logger;
use crate::telemetry::TelemetryMessage;
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the rumqttc request channel
const REQUEST_CAPACITY: usize = 32;

/// Bounded time to flush the DISCONNECT packet on shutdown
pub const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

/// Live broker connection
pub struct MqttConnection {
    client: AsyncClient,
    event_task: JoinHandle<()>,
}

impl MqttConnection {
    /// Connect, subscribe and start forwarding messages into `tx`.
    ///
    /// Fails if the broker does not accept the connection within
    /// `connect_timeout_seconds`.
    pub async fn connect(
        config: &MqttConfig,
        topics: Vec<String>,
        tx: mpsc::Sender<TelemetryMessage>,
    ) -> Result<Self> {
        let logger = get_logger("mqtt");
        let (client, mut event_loop) = AsyncClient::new(options(config), REQUEST_CAPACITY);

        logger.info(&format!(
            "Connecting to broker {}:{}",
            config.host, config.port
        ));
        let timeout = Duration::from_secs(config.connect_timeout_seconds.max(1));
        tokio::time::timeout(timeout, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| {
                SurplusError::timeout(format!(
                    "No CONNACK from {}:{} within {:?}",
                    config.host, config.port, timeout
                ))
            })??;
        logger.info("Connected");

        subscribe_all(&client, &topics).await?;

        let delay = Duration::from_millis(config.reconnect_delay_ms);
        let event_task = tokio::spawn(forward_events(
            event_loop,
            client.clone(),
            topics,
            tx,
            delay,
        ));

        Ok(Self { client, event_task })
    }

    /// Sink publishing charger commands over this connection
    pub fn sink(&self) -> MqttSink {
        MqttSink {
            client: self.client.clone(),
        }
    }

    /// Send DISCONNECT, give the event loop `grace` to flush it, then stop it
    pub async fn disconnect(self, grace: Duration) {
        let logger = get_logger("mqtt");
        if let Err(e) = self.client.disconnect().await {
            logger.warn(&format!("Disconnect request failed: {}", e));
        }
        let mut event_task = self.event_task;
        if tokio::time::timeout(grace, &mut event_task).await.is_err() {
            event_task.abort();
        }
        logger.info("Disconnected");
    }
}

fn options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.max(1)));
    options.set_clean_session(false);
    if !config.username.is_empty() {
        options.set_credentials(&config.username, &config.password);
    }
    options
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<()> {
    loop {
        match event_loop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(SurplusError::mqtt(format!(
                        "Broker refused connection: {:?}",
                        code
                    ))),
                };
            }
            _ => continue,
        }
    }
}

async fn subscribe_all(client: &AsyncClient, topics: &[String]) -> Result<()> {
    for topic in topics {
        client.subscribe(topic.as_str(), QoS::AtLeastOnce).await?;
    }
    Ok(())
}

async fn forward_events(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: Vec<String>,
    tx: mpsc::Sender<TelemetryMessage>,
    reconnect_delay: Duration,
) {
    let logger = get_logger("mqtt");
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = match std::str::from_utf8(&publish.payload) {
                    Ok(p) => p.to_string(),
                    Err(_) => {
                        logger.trace(&format!("Dropping non UTF-8 payload on {}", publish.topic));
                        continue;
                    }
                };
                logger.trace(&format!("Received {} = {}", publish.topic, payload));
                if tx
                    .send(TelemetryMessage::new(publish.topic, payload))
                    .await
                    .is_err()
                {
                    logger.debug("Telemetry receiver closed; stopping event loop");
                    return;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                logger.info("Reconnected");
                if !ack.session_present {
                    // Requests are drained by this loop, so subscribe from elsewhere
                    let client = client.clone();
                    let topics = topics.clone();
                    tokio::spawn(async move {
                        if let Err(e) = subscribe_all(&client, &topics).await {
                            get_logger("mqtt").error(&format!("Re-subscribe failed: {}", e));
                        }
                    });
                }
            }
            Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                logger.debug("Disconnect sent");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                logger.warn(&format!("Connection lost: {}", e));
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

/// Charger command sink over MQTT (QoS 1, not retained).
///
/// Publishing never waits on the request queue: when it is full the command
/// fails immediately and the emitter logs it as dropped.
#[derive(Clone)]
pub struct MqttSink {
    client: AsyncClient,
}

#[async_trait]
impl ChargerSink for MqttSink {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let payload = payload.as_bytes().to_vec();
        self.client.try_publish(topic, QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_carry_credentials_only_when_set() {
        let mut config = MqttConfig::default();
        let opts = options(&config);
        assert!(opts.credentials().is_none());
        assert_eq!(opts.broker_address(), ("localhost".to_string(), 1883));

        config.username = "energy".to_string();
        config.password = "secret".to_string();
        let opts = options(&config);
        assert_eq!(
            opts.credentials(),
            Some(("energy".to_string(), "secret".to_string()))
        );
        assert_eq!(opts.keep_alive(), Duration::from_secs(5));
        assert!(!opts.clean_session());
    }

    #[tokio::test]
    async fn connect_fails_when_broker_unreachable() {
        let mut config = MqttConfig::default();
        config.host = "127.0.0.1".to_string();
        // Nothing listens on port 9 (discard) in the test environment
        config.port = 9;
        config.connect_timeout_seconds = 2;
        let (tx, _rx) = mpsc::channel(1);
        let result = MqttConnection::connect(&config, vec!["a/b".to_string()], tx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn publish_fails_fast_when_request_queue_is_full() {
        // The event loop is never polled, so queued requests stay queued
        let (client, _event_loop) = AsyncClient::new(options(&MqttConfig::default()), 1);
        let sink = MqttSink { client };
        assert!(sink.publish("go-eCharger/1/amp", "6").await.is_ok());

        let second = sink.publish("go-eCharger/1/amp", "7");
        let result = tokio::time::timeout(Duration::from_secs(1), second).await;
        assert!(matches!(result, Ok(Err(SurplusError::Mqtt { .. }))));
    }
}
