//! Per-order dispense cycle.
//!
//! Each delivery walks `Received -> Acknowledged -> Dispensing -> Idle`:
//! the message is acknowledged first, the ingredient command is written, the
//! dispenser dwells for the intent's interval and then the reset command
//! returns every valve to idle. The ack comes before decoding and before any
//! serial write, so an order that fails after that point is not redelivered.

use std::time::Duration;

use sodamixer_core::{decode_order, Intent, SerialCommand, TranslateError, RESET_COMMAND};
use sodamixer_mqtt::{Delivery, MqttError};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::serial::{SerialTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellTimes {
    pub clean: Duration,
    pub dispense: Duration,
}

impl Default for DwellTimes {
    fn default() -> Self {
        Self { clean: Duration::from_secs(10), dispense: Duration::from_secs(20) }
    }
}

impl DwellTimes {
    pub fn for_intent(&self, intent: &Intent) -> Duration {
        if intent.is_clean() { self.clean } else { self.dispense }
    }
}

#[derive(Debug, Error)]
pub enum DispenseError {
    #[error("failed to acknowledge order: {0}")]
    Ack(#[from] MqttError),
    #[error(transparent)]
    Malformed(#[from] TranslateError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseReport {
    pub intent: Intent,
    pub command: SerialCommand,
    pub dwell: Duration,
}

pub struct Dispenser<T> {
    // Held for a whole cycle so two orders never interleave on the device.
    transport: Mutex<T>,
    dwell: DwellTimes,
}

impl<T: SerialTransport> Dispenser<T> {
    pub fn new(transport: T, dwell: DwellTimes) -> Self {
        Self { transport: Mutex::new(transport), dwell }
    }

    pub async fn process(&self, delivery: Delivery) -> Result<DispenseReport, DispenseError> {
        let Delivery { topic, payload, acker } = delivery;
        info!(%topic, len = payload.len(), "Received message");

        acker.ack().await?;
        debug!("Message acknowledged");

        let order = decode_order(&payload)?;
        info!(intent = %order.intent, "Received intent");

        let command = order.command();
        let dwell = self.dwell.for_intent(&order.intent);

        let mut transport = self.transport.lock().await;
        if let Err(err) = transport.write(command.as_bytes()).await {
            warn!(error = %err, %command, "Serial command failed; resetting device");
            if let Err(reset_err) = transport.write(RESET_COMMAND.as_bytes()).await {
                warn!(error = %reset_err, "Reset after failed command also failed");
            }
            return Err(err.into());
        }
        info!(%command, "Sent serial command");

        sleep(dwell).await;
        transport.write(RESET_COMMAND.as_bytes()).await?;
        info!(dwell_secs = dwell.as_secs(), "Device reset to idle");

        Ok(DispenseReport { intent: order.intent, command, dwell })
    }
}
