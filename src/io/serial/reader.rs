// src/io/serial/reader.rs
//
// serialport-backed transport.
// Blocking port reads run on a dedicated thread and hand decoded text chunks to
// the async side over a bounded channel, so a pending read can be cancelled
// promptly by dropping the future.

use async_trait::async_trait;
use serde::Serialize;
use std::io::Read;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::text::Utf8ChunkDecoder;
use super::utils::{to_serialport_data_bits, to_serialport_parity, to_serialport_stop_bits};
use crate::io::error::IoError;
use crate::io::transport::{Transport, TransportHandle};
use crate::io::types::SerialConfig;

/// Read timeout on the port. Bounds how long the reader thread takes to notice a stop.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Chunks buffered between the reader thread and the pump
const CHUNK_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Port Enumeration
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// List available serial ports
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The tty (terminal) devices block on open waiting for carrier detect.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, String> {
    let ports =
        serialport::available_ports().map_err(|e| format!("Failed to enumerate ports: {}", e))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::PciPort => {
                    ("PCI".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None, None)
                }
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}

/// Pick a device when none is configured: the first USB port, as a microcontroller
/// board shows up.
fn choose_port(ports: &[SerialPortInfo]) -> Option<String> {
    ports
        .iter()
        .find(|p| p.port_type == "USB")
        .map(|p| p.port_name.clone())
}

// ============================================================================
// Serial Transport
// ============================================================================

/// Opens real serial ports
#[derive(Default)]
pub struct SerialTransport;

impl SerialTransport {
    pub fn new() -> Self {
        SerialTransport
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn is_available(&self) -> bool {
        serialport::available_ports().is_ok()
    }

    async fn open(&self, config: &SerialConfig) -> Result<Box<dyn TransportHandle>, IoError> {
        let port_name = match &config.port {
            Some(p) => p.clone(),
            None => {
                let ports = list_serial_ports().map_err(IoError::unavailable)?;
                choose_port(&ports).ok_or(IoError::NoDevice)?
            }
        };

        let line = config.clone();
        let name = port_name.clone();
        // Opening can block briefly on some drivers
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(&name, line.baud_rate)
                .data_bits(to_serialport_data_bits(line.data_bits))
                .stop_bits(to_serialport_stop_bits(line.stop_bits))
                .parity(to_serialport_parity(&line.parity))
                .timeout(READ_TIMEOUT)
                .open()
        })
        .await
        .map_err(|e| IoError::connection(&port_name, format!("open task failed: {}", e)))?
        .map_err(|e| IoError::connection(&port_name, e.to_string()))?;

        tlog!("[serial] Opened {} at {}", port_name, config.summary());

        Ok(Box::new(SerialHandle::spawn(port_name, port)))
    }
}

// ============================================================================
// Serial Handle
// ============================================================================

/// An open serial port streaming decoded text
pub struct SerialHandle {
    device: String,
    rx: mpsc::Receiver<Result<String, IoError>>,
    stop_flag: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialHandle {
    fn spawn(device: String, port: Box<dyn serialport::SerialPort>) -> Self {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let stop_flag = Arc::new(AtomicBool::new(false));

        let thread_device = device.clone();
        let thread_stop = stop_flag.clone();
        let reader = tokio::task::spawn_blocking(move || {
            run_reader_blocking(thread_device, port, thread_stop, tx)
        });

        SerialHandle {
            device,
            rx,
            stop_flag,
            reader: Some(reader),
        }
    }
}

#[async_trait]
impl TransportHandle for SerialHandle {
    fn device(&self) -> &str {
        &self.device
    }

    async fn read_chunk(&mut self) -> Result<Option<String>, IoError> {
        // Sender dropped = reader thread finished = end of stream
        match self.rx.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        // Unblocks a reader thread waiting on a full channel
        self.rx.close();
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                tlog!("[serial] Reader thread for {} panicked: {:?}", self.device, e);
            }
        }
        tlog!("[serial] Closed {}", self.device);
    }
}

/// Blocking read loop. Ends on stop, EOF, error, or when the receiver goes away.
/// The port is dropped (closed) when this returns.
fn run_reader_blocking(
    device: String,
    mut port: Box<dyn serialport::SerialPort>,
    stop_flag: Arc<AtomicBool>,
    tx: mpsc::Sender<Result<String, IoError>>,
) {
    let mut buf = [0u8; 256];
    let mut decoder = Utf8ChunkDecoder::new();

    while !stop_flag.load(Ordering::SeqCst) {
        match port.read(&mut buf) {
            Ok(n) if n > 0 => {
                let text = decoder.decode(&buf[..n]);
                if text.is_empty() {
                    continue;
                }
                if tx.blocking_send(Ok(text)).is_err() {
                    break;
                }
            }
            Ok(_) => {
                // EOF - port closed/disconnected
                tlog!("[serial] {} reported end of stream", device);
                break;
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // Timeout is expected for serial reads
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(IoError::read(&device, e.to_string())));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, port_type: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: port_type.to_string(),
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    #[test]
    fn test_choose_port_prefers_usb() {
        let ports = vec![port("/dev/ttyS0", "PCI"), port("/dev/ttyACM0", "USB")];
        assert_eq!(choose_port(&ports), Some("/dev/ttyACM0".to_string()));
    }

    #[test]
    fn test_choose_port_none_without_usb() {
        let ports = vec![port("/dev/ttyS0", "PCI")];
        assert_eq!(choose_port(&ports), None);
        assert_eq!(choose_port(&[]), None);
    }
}
