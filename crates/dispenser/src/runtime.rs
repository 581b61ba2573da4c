use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Result};
use sodamixer_mqtt::{Delivery, MqttEvent};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::metrics::Metrics;
use crate::sequencer::{DispenseError, Dispenser};
use crate::serial::SerialTransport;

/// Consumes deliveries one at a time until `shutdown` resolves or the broker
/// connection dies.
///
/// `shutdown` is only checked between orders: an order already taken always
/// runs through to its reset write. The delivery channel only closes when the
/// event loop has given up, so that case is an error.
pub async fn run<T, F>(
    mut deliveries: mpsc::Receiver<Delivery>,
    dispenser: &Dispenser<T>,
    metrics: &Metrics,
    shutdown: F,
) -> Result<()>
where
    T: SerialTransport,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        let delivery = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested; no further orders will be taken");
                return Ok(());
            }
            next = deliveries.recv() => match next {
                Some(delivery) => delivery,
                None => bail!("delivery stream closed"),
            },
        };

        metrics.orders_received.inc();
        match dispenser.process(delivery).await {
            Ok(report) => {
                metrics.orders_dispensed.inc();
                info!(intent = %report.intent, command = %report.command, dwell_secs = report.dwell.as_secs(), "Order complete");
            }
            Err(DispenseError::Malformed(err)) => {
                metrics.orders_malformed.inc();
                error!(error = %err, "Dropping acknowledged order");
            }
            Err(DispenseError::Transport(err)) => {
                metrics.serial_errors.inc();
                error!(error = %err, "Serial failure; order lost");
            }
            Err(err @ DispenseError::Ack(_)) => {
                // Unacked, so the broker redelivers it later
                warn!(error = %err, "Skipping order");
            }
        }
    }
}

pub async fn watch_connection(mut events: broadcast::Receiver<MqttEvent>, metrics: Arc<Metrics>) {
    loop {
        match events.recv().await {
            Ok(MqttEvent::Connected { .. }) => metrics.broker_connected.set(1),
            Ok(MqttEvent::Disconnected) => metrics.broker_connected.set(0),
            Ok(MqttEvent::Fatal(reason)) => {
                metrics.broker_connected.set(0);
                error!(%reason, "Broker connection lost permanently");
            }
            Ok(MqttEvent::PubAck(_) | MqttEvent::SubAck { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Connection event watcher lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
