#[macro_use]
mod logging;

pub mod connection;
pub mod console;
pub mod io;
pub mod record;
pub mod settings;
pub mod sink;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use connection::{ConnectionManager, ConnectionState};
use console::{format_row, Console};
use io::{SerialConfig, Transport};
use settings::AppSettings;
use sink::SampleSink;

/// How long exit waits for blocking work (the stdin reader, a port read) to finish
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "flowmon", version, about = "Live monitor for a serial flow meter")]
struct Cli {
    /// Serial port (default: first USB serial device)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Settings file (default: <config dir>/flowmon/settings.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Connect immediately instead of waiting for a command
    #[arg(long)]
    connect: bool,
}

/// Parsed stdin command
#[derive(Debug, PartialEq)]
enum Command {
    Toggle,
    Connect,
    Disconnect,
    Status,
    History,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    match line.trim().to_lowercase().as_str() {
        "" => Command::Toggle,
        "c" | "connect" => Command::Connect,
        "d" | "disconnect" => Command::Disconnect,
        "s" | "status" => Command::Status,
        "h" | "history" => Command::History,
        "q" | "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

// ============================================================================
// Entry Point
// ============================================================================

pub fn run() -> Result<(), String> {
    let cli = Cli::parse();

    let settings_path = cli.config.clone().or_else(settings::default_settings_path);
    let mut app_settings = match &settings_path {
        Some(path) => settings::load_settings(path)?,
        None => AppSettings::default(),
    };
    if let Some(port) = &cli.port {
        app_settings.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        app_settings.baud_rate = baud;
    }

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| app_settings.log_dir.as_ref().map(PathBuf::from));
    if let Some(dir) = &log_dir {
        logging::init_file_logging(dir)?;
    }

    if cli.list_ports {
        return list_ports();
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    let result = runtime.block_on(run_session_loop(app_settings, cli.connect));
    // tokio's stdin read stays parked on a blocking thread after Ctrl-C
    shutdown_runtime(runtime);
    logging::stop_file_logging();
    result
}

fn shutdown_runtime(runtime: tokio::runtime::Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

#[cfg(not(target_os = "ios"))]
fn list_ports() -> Result<(), String> {
    let ports = io::serial::list_serial_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for p in ports {
        let usb = match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => format!(" [{:04x}:{:04x}]", vid, pid),
            _ => String::new(),
        };
        println!(
            "{}  {}{}  {}",
            p.port_name,
            p.port_type,
            usb,
            p.product.or(p.manufacturer).unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(target_os = "ios")]
fn list_ports() -> Result<(), String> {
    Err("Serial ports are not supported on this platform".to_string())
}

fn host_transport() -> Arc<dyn Transport> {
    #[cfg(not(target_os = "ios"))]
    {
        Arc::new(io::serial::SerialTransport::new())
    }
    #[cfg(target_os = "ios")]
    {
        Arc::new(io::UnsupportedTransport)
    }
}

async fn run_session_loop(app_settings: AppSettings, auto_connect: bool) -> Result<(), String> {
    let console = Console;
    let sink = SampleSink::new(
        Box::new(console.clone()),
        Box::new(console.clone()),
        Box::new(console.clone()),
        app_settings.window_capacity,
    );
    let ui = Arc::new(console);
    let mut manager = ConnectionManager::new(
        host_transport(),
        sink,
        ui.clone(),
        ui,
        app_settings.max_line_length,
    );
    let serial_config: SerialConfig = app_settings.serial_config();

    manager.probe();
    tlog!(
        "[flowmon] Port: {} at {}",
        serial_config.port.as_deref().unwrap_or("auto"),
        serial_config.summary()
    );
    println!("Commands: Enter = connect/disconnect, status, history, quit");

    if auto_connect && manager.is_enabled() {
        // Failures are reported by the manager; the loop stays usable
        let _ = manager.connect(&serial_config).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tlog!("[flowmon] Interrupted");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tlog!("[flowmon] Failed to read stdin: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Command::Toggle => {
                if manager.is_enabled() {
                    let _ = manager.toggle(&serial_config).await;
                }
            }
            Command::Connect => {
                if manager.is_enabled() {
                    let _ = manager.connect(&serial_config).await;
                }
            }
            Command::Disconnect => manager.disconnect().await,
            Command::Status => print_status(&manager),
            Command::History => print_history(&manager),
            Command::Quit => break,
            Command::Unknown(cmd) => println!("Unknown command: {}", cmd),
        }
    }

    manager.disconnect().await;
    Ok(())
}

fn print_status(manager: &ConnectionManager) {
    let stats = manager.stats();
    let state = match manager.state() {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnecting => "disconnecting",
    };
    println!(
        "State: {}  chunks: {}  lines: {}  samples: {}  skipped: {}  oversized: {}",
        state, stats.chunks, stats.lines, stats.samples, stats.rejected, stats.oversized
    );
    manager.with_sink(|sink| {
        if let Some(last) = sink.history().latest() {
            println!(
                "Last: {}",
                format_row(&last.observed_at, last.flow, last.total_volume)
            );
        }
    });
}

fn print_history(manager: &ConnectionManager) {
    manager.with_sink(|sink| {
        if sink.history().is_empty() {
            println!("No samples this session");
        }
        for s in sink.history().iter() {
            println!("  {}", format_row(&s.observed_at, s.flow, s.total_volume));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(""), Command::Toggle);
        assert_eq!(parse_command("  Connect "), Command::Connect);
        assert_eq!(parse_command("d"), Command::Disconnect);
        assert_eq!(parse_command("q"), Command::Quit);
        assert_eq!(parse_command("foo"), Command::Unknown("foo".to_string()));
    }

    #[test]
    fn test_shutdown_does_not_wait_for_blocked_reads() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        // Stands in for a stdin read that never completes
        let (_tx, rx) = std::sync::mpsc::channel::<()>();
        runtime.spawn_blocking(move || {
            let _ = rx.recv();
        });

        let started = std::time::Instant::now();
        shutdown_runtime(runtime);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["flowmon", "--port", "/dev/ttyACM0", "-b", "115200", "--connect"]);
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(cli.baud, Some(115200));
        assert!(cli.connect);
        assert!(!cli.list_ports);
    }
}
