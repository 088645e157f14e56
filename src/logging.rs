// src/logging.rs
//
// Session logging. Every `tlog!` line goes to stderr with a local timestamp and,
// when `--log-dir` (or `log_dir` in settings) is given, to a per-run file as well.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Name of the link that always points at the newest run's log
const CURRENT_LOG_LINK: &str = "flowmon.log";

/// Open log file for this run; `None` means stderr only
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Local wall-clock prefix for log lines
pub(crate) fn stamp() -> impl std::fmt::Display {
    chrono::Local::now().format("%H:%M:%S%.3f")
}

/// One file per run, e.g. `20261017-142501-flowmon.log`
fn run_log_name(started: chrono::DateTime<chrono::Local>) -> String {
    started.format("%Y%m%d-%H%M%S-flowmon.log").to_string()
}

/// Start mirroring `tlog!` output into `log_dir`. Returns the path of the new file.
pub(crate) fn init_file_logging(log_dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Cannot create log directory {}: {}", log_dir.display(), e))?;

    let name = run_log_name(chrono::Local::now());
    let path = log_dir.join(&name);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("Cannot open log file {}: {}", path.display(), e))?;

    #[cfg(unix)]
    {
        let link = log_dir.join(CURRENT_LOG_LINK);
        let _ = std::fs::remove_file(&link);
        if let Err(e) = std::os::unix::fs::symlink(&name, &link) {
            eprintln!("{} [logging] {} not updated: {}", stamp(), CURRENT_LOG_LINK, e);
        }
    }

    if let Ok(mut slot) = LOG_FILE.lock() {
        *slot = Some(file);
    }
    // Not tlog!: the session header belongs on stderr only
    eprintln!("{} [logging] Writing session log to {}", stamp(), path.display());

    Ok(path)
}

/// Close the session log. Later `tlog!` calls go to stderr only.
pub(crate) fn stop_file_logging() {
    let closed = LOG_FILE
        .lock()
        .map(|mut slot| slot.take().is_some())
        .unwrap_or(false);
    if closed {
        eprintln!("{} [logging] Session log closed", stamp());
    }
}

/// `eprintln!` with a timestamp, mirrored to the session log when one is open.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let line = format!("{} {}", $crate::logging::stamp(), format_args!($($arg)*));
        eprintln!("{}", line);
        if let Ok(mut slot) = $crate::logging::LOG_FILE.lock() {
            if let Some(file) = slot.as_mut() {
                let _ = writeln!(file, "{}", line);
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_log_name_sorts_by_start_time() {
        let started = chrono::Local.with_ymd_and_hms(2026, 10, 17, 14, 25, 1).unwrap();
        assert_eq!(run_log_name(started), "20261017-142501-flowmon.log");
    }

    #[test]
    fn test_session_log_receives_tlog_lines() {
        let dir = std::env::temp_dir().join(format!("flowmon-log-test-{}", std::process::id()));
        let path = init_file_logging(&dir).unwrap();
        tlog!("[test] flow 1.50 L/min");
        stop_file_logging();
        tlog!("[test] after close");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[test] flow 1.50 L/min"));
        assert!(!contents.contains("after close"));

        #[cfg(unix)]
        assert_eq!(
            std::fs::read_link(dir.join(CURRENT_LOG_LINK)).unwrap(),
            PathBuf::from(path.file_name().unwrap())
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
