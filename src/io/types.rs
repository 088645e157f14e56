// src/io/types.rs
//
// Platform-independent transport configuration types.
// The serial driver converts these into serialport crate types (see serial/utils.rs).

use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    /// Single-letter code used in `8-N-1` style summaries
    pub fn code(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

/// Serial port configuration used when opening a transport
#[derive(Clone, Debug, PartialEq)]
pub struct SerialConfig {
    /// Port path. `None` lets the driver pick the first USB serial device.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: None,
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

impl SerialConfig {
    /// Line settings summary, e.g. `9600 baud (8-N-1)`
    pub fn summary(&self) -> String {
        format!(
            "{} baud ({}-{}-{})",
            self.baud_rate,
            self.data_bits,
            self.parity.code(),
            self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_default() {
        assert_eq!(Parity::default(), Parity::None);
    }

    #[test]
    fn test_summary_matches_arduino_defaults() {
        assert_eq!(SerialConfig::default().summary(), "9600 baud (8-N-1)");
    }
}
