// src/io/mod.rs
//
// Transport abstraction for the flow meter stream.
// The connection manager talks to `Transport` / `TransportHandle` only; the serial
// driver is one implementation.

mod error;
pub mod serial;
mod transport;
mod types;

pub use error::IoError;
pub use transport::{Transport, TransportHandle, UnsupportedTransport};
pub use types::{Parity, SerialConfig};
