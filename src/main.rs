use anyhow::Result;
use surplusd::config::Config;
use surplusd::driver::EnergyDriver;
use surplusd::mqtt::{DISCONNECT_GRACE, MqttConnection};
use surplusd::topics::TopicMap;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Inbound telemetry buffered between the MQTT event loop and the driver
const TELEMETRY_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .and_then(|c| c.validate().map(|()| c))
    .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    surplusd::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "surplusd {} starting, broker {}:{}, charger {}",
        env!("APP_VERSION"),
        config.mqtt.host,
        config.mqtt.port,
        config.charger.serial
    );

    let (tx, rx) = mpsc::channel(TELEMETRY_CAPACITY);
    let subscriptions = TopicMap::from_config(&config)
        .subscriptions()
        .map(str::to_string)
        .collect();
    let connection = MqttConnection::connect(&config.mqtt, subscriptions, tx)
        .await
        .map_err(|e| {
            error!("Failed to connect to MQTT broker: {}", e);
            e
        })?;

    let mut driver = EnergyDriver::new(&config, connection.sink());
    let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel::<()>();
    let driver_task = tokio::spawn(async move { driver.run(rx, shutdown_rx).await });

    let signal = wait_for_termination().await?;
    info!("Got signal: {}", signal);

    let _ = shutdown_tx.send(());
    match driver_task.await {
        Ok(Ok(())) => info!("Driver shutdown complete"),
        Ok(Err(e)) => error!("Driver failed with error: {}", e),
        Err(e) => error!("Driver task panicked: {}", e),
    }

    connection.disconnect(DISCONNECT_GRACE).await;
    info!("END");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
