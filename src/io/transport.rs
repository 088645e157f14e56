// src/io/transport.rs
//
// Transport seam between the connection manager and a concrete byte source.
// The serial driver implements it for real ports; tests implement it in memory.

use async_trait::async_trait;

use super::error::IoError;
use super::types::SerialConfig;

/// A host facility that can open transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the host can provide transports at all
    fn is_available(&self) -> bool;

    /// Acquire and open a transport handle
    async fn open(&self, config: &SerialConfig) -> Result<Box<dyn TransportHandle>, IoError>;
}

/// An open transport producing decoded text chunks.
#[async_trait]
pub trait TransportHandle: Send {
    /// Human-readable device name (for logs and error messages)
    fn device(&self) -> &str;

    /// Read the next non-empty text chunk.
    /// Returns `Ok(None)` at end of stream.
    /// Must be cancel-safe: dropping the future must not lose data or hang.
    async fn read_chunk(&mut self) -> Result<Option<String>, IoError>;

    /// Close the handle and release the device
    async fn close(&mut self);
}

/// Transport used on hosts without serial support. Never available.
pub struct UnsupportedTransport;

#[async_trait]
impl Transport for UnsupportedTransport {
    fn is_available(&self) -> bool {
        false
    }

    async fn open(&self, _config: &SerialConfig) -> Result<Box<dyn TransportHandle>, IoError> {
        Err(IoError::unavailable("serial ports are not supported on this platform"))
    }
}
