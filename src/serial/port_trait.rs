//! Line-level port seam between `SerialLink` and the serial device

use async_trait::async_trait;
use std::io;
use tokio::io::AsyncWriteExt;

/// Port that accepts one wire line at a time
#[async_trait]
pub trait LinePort: Send {
    /// Queue a complete wire line (terminator included)
    async fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Push queued bytes out to the device
    async fn flush(&mut self) -> io::Result<()>;
}

#[async_trait]
impl LinePort for tokio_serial::SerialStream {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_all(line.as_bytes()).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        AsyncWriteExt::flush(self).await
    }
}
