use std::fmt;

use async_trait::async_trait;

use crate::error::MqttError;

/// Settles one delivered message with the broker.
#[async_trait]
pub trait AckHandle: Send {
    async fn ack(self: Box<Self>) -> Result<(), MqttError>;
}

/// Single-use acknowledgement; consumed by [`Acker::ack`].
pub struct Acker(Box<dyn AckHandle>);

impl Acker {
    pub fn new(handle: impl AckHandle + 'static) -> Self {
        Self(Box::new(handle))
    }

    pub async fn ack(self) -> Result<(), MqttError> {
        self.0.ack().await
    }
}

pub struct Delivery {
    pub topic: String,
    pub payload: Vec<u8>,
    pub acker: Acker,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, acker: Acker) -> Self {
        Self { topic: topic.into(), payload, acker }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .finish_non_exhaustive()
    }
}
