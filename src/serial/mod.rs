//! # Serial Transport
//!
//! Sends encoded command frames to the vehicle over a serial link.
//!
//! This module handles:
//! - Opening the configured port (8N1, no flow control)
//! - Writing one wire line per frame and flushing it
//! - The `FrameSink` seam used by the control loop
//!
//! The link is fire-and-forget: no acknowledgement, no retransmission.

pub mod port_trait;

use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::protocol::Frame;
use port_trait::LinePort;

/// Default serial device
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Baud rates accepted by the configuration
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    9_600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600,
];

/// Destination for encoded frames.
#[async_trait]
pub trait FrameSink: Send {
    /// Hands one frame to the transport.
    async fn send(&mut self, frame: &Frame) -> Result<()>;
}

/// Frame link over a serial port
pub struct SerialLink<P: LinePort = tokio_serial::SerialStream> {
    port: P,
    device_path: String,
    frames_sent: u64,
}

impl<P: LinePort> std::fmt::Debug for SerialLink<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .field("frames_sent", &self.frames_sent)
            .finish_non_exhaustive()
    }
}

impl SerialLink<tokio_serial::SerialStream> {
    /// Opens `path` at `baud_rate`, 8 data bits, no parity, 1 stop bit.
    ///
    /// # Errors
    ///
    /// `Serial` if the port cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dualshock_bridge::serial::SerialLink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let link = SerialLink::open("/dev/ttyUSB0", 115_200)?;
    ///     println!("Connected to: {}", link.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| BridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Self::with_port(port, path))
    }
}

impl<P: LinePort> SerialLink<P> {
    /// Wraps an already opened port.
    pub fn with_port(port: P, device_path: &str) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
            frames_sent: 0,
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Frames written successfully so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Writes a frame's wire text and flushes.
    ///
    /// # Errors
    ///
    /// `Serial` if the write or flush fails.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let wire = frame.to_wire();

        self.port
            .write_line(&wire)
            .await
            .map_err(|e| BridgeError::Serial(format!("Failed to write frame: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| BridgeError::Serial(format!("Failed to flush serial port: {}", e)))?;

        self.frames_sent += 1;
        debug!("Sent frame {}", wire.trim_end());
        Ok(())
    }
}

#[async_trait]
impl<P: LinePort> FrameSink for SerialLink<P> {
    async fn send(&mut self, frame: &Frame) -> Result<()> {
        self.send_frame(frame).await
    }
}
