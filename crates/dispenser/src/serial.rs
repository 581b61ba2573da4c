//! Byte-oriented link to the mixer's microcontroller.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

pub const DEFAULT_SERIAL_PATH: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },
    #[error("serial write failed: {0}")]
    Write(#[from] std::io::Error),
}

#[async_trait]
pub trait SerialTransport: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

pub struct SerialPort {
    path: String,
    stream: SerialStream,
}

impl SerialPort {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let stream = tokio_serial::new(path, baud_rate)
            .open_native_async()
            .map_err(|source| TransportError::Open { path: path.to_string(), source })?;
        Ok(Self { path: path.to_string(), stream })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl SerialTransport for SerialPort {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        debug!(path = %self.path, len = bytes.len(), "Wrote serial bytes");
        Ok(())
    }
}
