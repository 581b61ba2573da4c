// In-memory stand-ins for the serial device and the broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sodamixer_mqtt::{AckHandle, Acker, Delivery, MqttError};
use tokio::time::Instant;

use crate::serial::{SerialTransport, TransportError};

#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub writes: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
    pub fail_writes: usize,
}

impl RecordingTransport {
    pub fn failing(count: usize) -> Self {
        Self { fail_writes: count, ..Default::default() }
    }

    pub fn written(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    pub fn instants(&self) -> Vec<Instant> {
        self.writes.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl SerialTransport for RecordingTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(TransportError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }
        self.writes.lock().unwrap().push((Instant::now(), bytes.to_vec()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct AckCounter(pub Arc<AtomicUsize>);

impl AckCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn delivery(&self, payload: &[u8]) -> Delivery {
        Delivery::new(
            "projects/sodamixer-cc5ba/topics/SodaMixerMessages",
            payload.to_vec(),
            Acker::new(CountingAck(self.0.clone())),
        )
    }
}

struct CountingAck(Arc<AtomicUsize>);

#[async_trait]
impl AckHandle for CountingAck {
    async fn ack(self: Box<Self>) -> Result<(), MqttError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn order_payload(intent: &str, ingredients: &[&str]) -> Vec<u8> {
    let inner = serde_json::json!({ "intent": intent, "ingredient": ingredients }).to_string();
    serde_json::to_vec(&inner).unwrap()
}
