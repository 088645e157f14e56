// src/io/error.rs
//
// Transport error taxonomy shared by the serial driver and the connection manager.

use std::fmt;

/// Errors raised while acquiring or reading from a transport.
#[derive(Clone, Debug, PartialEq)]
pub enum IoError {
    /// The host has no serial capability at all
    Unavailable(String),
    /// No device was chosen (none configured and none found)
    NoDevice,
    /// The device rejected the open request
    Connection { device: String, message: String },
    /// The transport failed mid-stream
    Read { device: String, message: String },
}

impl IoError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        IoError::Unavailable(message.into())
    }

    pub fn connection(device: &str, message: impl Into<String>) -> Self {
        IoError::Connection {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn read(device: &str, message: impl Into<String>) -> Self {
        IoError::Read {
            device: device.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Unavailable(msg) => write!(f, "Serial transport unavailable: {}", msg),
            IoError::NoDevice => write!(f, "No serial device chosen"),
            IoError::Connection { device, message } => {
                write!(f, "Failed to open {}: {}", device, message)
            }
            IoError::Read { device, message } => write!(f, "Read error on {}: {}", device, message),
        }
    }
}

impl std::error::Error for IoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_device() {
        let err = IoError::connection("/dev/ttyACM0", "Permission denied");
        assert_eq!(err.to_string(), "Failed to open /dev/ttyACM0: Permission denied");

        let err = IoError::read("COM3", "device unplugged");
        assert_eq!(err.to_string(), "Read error on COM3: device unplugged");
    }
}
