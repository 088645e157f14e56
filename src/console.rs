// src/console.rs
//
// Terminal presentation: the current reading, history rows, a sparkline chart and
// the connection status line. Readings go to stdout; errors go through tlog!.

use chrono::{DateTime, Local};

use crate::connection::{ConnectionIndicator, ErrorReporter};
use crate::sink::{ChartSink, CurrentValueSink, HistoryLogSink, RollingWindow};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render window values as a sparkline scaled from zero to the window maximum
pub fn sparkline(values: impl Iterator<Item = f64>) -> String {
    let values: Vec<f64> = values.collect();
    let max = values.iter().cloned().fold(0.0_f64, f64::max);
    values
        .iter()
        .map(|v| {
            if max <= 0.0 || !v.is_finite() {
                SPARK_LEVELS[0]
            } else {
                let idx = ((v.max(0.0) / max) * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
                SPARK_LEVELS[idx.min(SPARK_LEVELS.len() - 1)]
            }
        })
        .collect()
}

/// One history row, e.g. `2024-05-01 12:00:00 |   1.50 L/min |  10.00 L`
pub fn format_row(observed_at: &DateTime<Local>, flow: f64, total_volume: f64) -> String {
    format!(
        "{} | {:>7.2} L/min | {:>8.2} L",
        observed_at.format("%Y-%m-%d %H:%M:%S"),
        flow,
        total_volume
    )
}

#[derive(Clone, Default)]
pub struct Console;

impl CurrentValueSink for Console {
    fn set_current(&mut self, flow: f64, total_volume: f64) {
        println!("Flow: {:.2} L/min   Total: {:.2} L", flow, total_volume);
    }
}

impl HistoryLogSink for Console {
    fn prepend_row(&mut self, observed_at: DateTime<Local>, flow: f64, total_volume: f64) {
        println!("  {}", format_row(&observed_at, flow, total_volume));
    }

    fn clear(&mut self) {
        println!("--- new session ---");
    }
}

impl ChartSink for Console {
    fn redraw(&mut self, window: &RollingWindow) {
        println!(
            "  [{}] {}/{}",
            sparkline(window.values()),
            window.len(),
            window.capacity()
        );
    }
}

impl ConnectionIndicator for Console {
    fn set_connected(&self, connected: bool, device: Option<&str>) {
        match (connected, device) {
            (true, Some(d)) => println!("● Connected to {} (press Enter to disconnect)", d),
            (true, None) => println!("● Connected (press Enter to disconnect)"),
            (false, _) => println!("○ Disconnected (press Enter to connect)"),
        }
    }

    fn set_unavailable(&self) {
        println!("○ Serial not supported on this host; connecting is disabled");
    }
}

impl ErrorReporter for Console {
    fn report(&self, message: &str) {
        tlog!("[error] {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparkline_scales_to_max() {
        assert_eq!(sparkline([0.0, 3.5, 7.0].into_iter()), "▁▅█");
    }

    #[test]
    fn test_sparkline_all_zero() {
        assert_eq!(sparkline([0.0, 0.0].into_iter()), "▁▁");
        assert_eq!(sparkline(std::iter::empty()), "");
    }

    #[test]
    fn test_format_row_two_decimals() {
        let at = Local::now();
        let row = format_row(&at, 1.5, 10.0);
        assert!(row.ends_with("|    1.50 L/min |    10.00 L"));
    }
}
