// src/io/serial/mod.rs
//
// Serial port driver and line framing for the flow meter stream.
//
// Features:
// - Line framing of decoded text (platform independent)
// - Incremental UTF-8 decoding of raw port bytes
// - serialport-backed transport with port enumeration (desktop only)

pub mod framer;
pub mod text;
#[cfg(not(target_os = "ios"))]
pub mod reader;
#[cfg(not(target_os = "ios"))]
pub(crate) mod utils;

pub use framer::LineFramer;
#[cfg(not(target_os = "ios"))]
pub use reader::{list_serial_ports, SerialPortInfo, SerialTransport};
