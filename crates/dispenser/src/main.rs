use anyhow::Context;
use dotenvy::dotenv;
use sodamixer_mqtt::{ensure_subscription, MqttConfig, MqttService};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod http;
mod metrics;
mod runtime;
mod sequencer;
mod serial;
#[cfg(test)]
mod testing;

use config::DispenserConfig;
use metrics::Metrics;
use sequencer::Dispenser;
use serial::SerialPort;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = DispenserConfig::from_env();

    let serial = SerialPort::open(&config.serial_path, config.baud_rate)
        .context("failed to open mixer serial port")?;
    info!(path = serial.path(), baud = config.baud_rate, "Connected to mixer");

    let mut mqtt_cfg = MqttConfig::from_env().with_persistent_session(config.subscription.name());
    mqtt_cfg.max_in_flight = config.max_in_flight;
    info!(host = %mqtt_cfg.host, port = mqtt_cfg.port, client_id = %mqtt_cfg.client_id, "Configuring MQTT client");
    let (mqtt, deliveries) = MqttService::connect(mqtt_cfg)
        .await
        .context("failed to initialize MQTT")?;

    let metrics = Metrics::new();
    tokio::spawn(runtime::watch_connection(mqtt.events(), metrics.clone()));

    ensure_subscription(&mqtt, &config.subscription, &config.topic)
        .await
        .context("failed to provision subscription")?;

    if let Some(addr) = config.http_addr {
        let state = http::AppState { mqtt: mqtt.clone() };
        tokio::spawn(async move {
            if let Err(err) = http::serve(addr, state).await {
                error!(error = %err, "Ops HTTP server stopped");
            }
        });
    }

    let dispenser = Dispenser::new(serial, config.dwell);
    info!(subscription = %config.subscription, max_in_flight = config.max_in_flight, "Listening for messages");

    let result = runtime::run(deliveries, &dispenser, &metrics, shutdown_signal()).await;
    let _ = mqtt.disconnect().await;
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,rumqttc=warn"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
