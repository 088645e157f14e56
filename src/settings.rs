// src/settings.rs
//
// Persistent settings for the serial line and the chart window.
// Read from a TOML file; missing keys take their defaults and CLI flags override.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::io::serial::framer::DEFAULT_MAX_LINE_LENGTH;
use crate::io::{Parity, SerialConfig};
use crate::sink::DEFAULT_WINDOW_CAPACITY;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    /// Serial port path; unset = first USB serial device
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    /// Points kept on the chart
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Unterminated input longer than this is discarded
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Directory for log files; unset = stderr only
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_baud_rate() -> u32 {
    9600 // Arduino sketch default
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}
fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            port: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::None,
            window_capacity: default_window_capacity(),
            max_line_length: default_max_line_length(),
            log_dir: None,
        }
    }
}

impl AppSettings {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity.clone(),
        }
    }
}

/// `<config dir>/flowmon/settings.toml`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flowmon").join("settings.toml"))
}

pub fn parse_settings(contents: &str) -> Result<AppSettings, String> {
    toml::from_str(contents).map_err(|e| format!("Invalid settings: {}", e))
}

/// Load settings from `path`. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<AppSettings, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_settings(&contents)
            .map_err(|e| format!("{} ({})", e, path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppSettings::default()),
        Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.window_capacity, 60);
    }

    #[test]
    fn test_parse_overrides() {
        let settings = parse_settings(
            r#"
port = "/dev/ttyUSB1"
baud_rate = 115200
parity = "even"
window_capacity = 120
"#,
        )
        .unwrap();

        assert_eq!(settings.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(settings.parity, Parity::Even);

        let config = settings.serial_config();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.data_bits, 8);
        assert_eq!(settings.window_capacity, 120);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(parse_settings("baud_rate = \"fast\"").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("flowmon-no-such-dir/settings.toml");
        assert_eq!(load_settings(&path).unwrap(), AppSettings::default());
    }
}
