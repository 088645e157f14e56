// src/connection.rs
//
// Connection lifecycle: owns the transport handle and the read pump, and is the
// only place that changes ConnectionState or talks to the error reporter.
//
//   Disconnected --connect--> Connecting --open ok--> Connected
//        ^                        |                      |
//        +------- open failed ----+                      |
//        +------- Disconnecting <-- user disconnect / EOF / read error

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::io::serial::LineFramer;
use crate::io::{IoError, SerialConfig, Transport, TransportHandle};
use crate::record;
use crate::sink::SampleSink;

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// The connect/disconnect affordance (a single toggle control)
pub trait ConnectionIndicator: Send + Sync {
    fn set_connected(&self, connected: bool, device: Option<&str>);
    /// Host cannot provide transports; connecting is disabled for good
    fn set_unavailable(&self) {}
}

/// User-facing error reporting
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Why the read pump stopped
#[derive(Clone, Debug, PartialEq)]
pub enum PumpExit {
    /// Disconnect was requested
    Cancelled,
    /// The transport reported end of stream
    EndOfStream,
    /// The transport failed mid-stream
    ReadError(IoError),
}

/// Per-connection counters, reset on connect
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PumpStats {
    pub chunks: u64,
    pub lines: u64,
    pub samples: u64,
    pub rejected: u64,
    /// Unterminated input dropped by the line-length guard
    pub oversized: u64,
}

struct Pump {
    cancel: CancellationToken,
    task: JoinHandle<PumpExit>,
}

/// State shared between the manager and its running pump
struct Shared {
    state: Mutex<ConnectionState>,
    stats: Mutex<PumpStats>,
    sink: Mutex<SampleSink>,
    indicator: Arc<dyn ConnectionIndicator>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = lock(&self.state);
        if *state != next {
            tlog!("[connection] {:?} -> {:?}", *state, next);
            *state = next;
        }
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// ConnectionManager
// ============================================================================

pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    pump: Option<Pump>,
    enabled: bool,
    max_line_length: usize,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: SampleSink,
        indicator: Arc<dyn ConnectionIndicator>,
        reporter: Arc<dyn ErrorReporter>,
        max_line_length: usize,
    ) -> Self {
        ConnectionManager {
            transport,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Disconnected),
                stats: Mutex::new(PumpStats::default()),
                sink: Mutex::new(sink),
                indicator,
                reporter,
            }),
            pump: None,
            enabled: true,
            max_line_length,
        }
    }

    /// Check once that the host can provide transports at all.
    /// When it cannot, the failure is reported and connecting stays disabled.
    pub fn probe(&mut self) -> bool {
        self.enabled = self.transport.is_available();
        if !self.enabled {
            tlog!("[connection] Transport unavailable, connect disabled");
            self.shared
                .reporter
                .report("Serial ports are not available on this host.");
            self.shared.indicator.set_unavailable();
        }
        self.enabled
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> PumpStats {
        lock(&self.shared.stats).clone()
    }

    /// Run `f` against the sample sink (history, window)
    pub fn with_sink<R>(&self, f: impl FnOnce(&SampleSink) -> R) -> R {
        f(&lock(&self.shared.sink))
    }

    /// Open a transport and start the read pump.
    /// Connecting while already connected is refused; failures leave the manager
    /// Disconnected and ready for another attempt.
    pub async fn connect(&mut self, config: &SerialConfig) -> Result<(), IoError> {
        if !self.enabled {
            return Err(IoError::unavailable("connect is disabled on this host"));
        }

        // A pump that ended on its own still has to be joined before a new session
        self.reap_finished_pump().await;

        if self.state() != ConnectionState::Disconnected {
            return Err(IoError::connection(
                config.port.as_deref().unwrap_or("serial"),
                "already connected",
            ));
        }

        self.shared.set_state(ConnectionState::Connecting);
        lock(&self.shared.sink).reset_session();
        *lock(&self.shared.stats) = PumpStats::default();

        let handle = match self.transport.open(config).await {
            Ok(h) => h,
            Err(e) => {
                tlog!("[connection] Open failed: {}", e);
                self.shared.reporter.report(&format!("Error connecting: {}", e));
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let device = handle.device().to_string();
        self.shared.set_state(ConnectionState::Connected);
        self.shared.indicator.set_connected(true, Some(&device));

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_pump(
            handle,
            LineFramer::new(self.max_line_length),
            self.shared.clone(),
            cancel.clone(),
        ));
        self.pump = Some(Pump { cancel, task });

        tlog!("[connection] Connected to {}", device);
        Ok(())
    }

    /// Cancel the pending read, close the transport and wait for the pump to finish.
    /// A no-op when nothing is connected.
    pub async fn disconnect(&mut self) {
        let Some(pump) = self.pump.take() else {
            return;
        };

        // The pump may already have torn itself down (EOF / read error)
        let user_initiated = self.state() == ConnectionState::Connected;
        if user_initiated {
            self.shared.set_state(ConnectionState::Disconnecting);
        }

        pump.cancel.cancel();
        let exit = join_pump(pump.task).await;

        if user_initiated {
            self.shared.set_state(ConnectionState::Disconnected);
            self.shared.indicator.set_connected(false, None);
        }
        tlog!("[connection] Disconnected ({:?})", exit);
    }

    /// Toggle between connected and disconnected
    pub async fn toggle(&mut self, config: &SerialConfig) -> Result<(), IoError> {
        if self.state() == ConnectionState::Connected {
            self.disconnect().await;
            Ok(())
        } else {
            self.connect(config).await
        }
    }

    /// Join a pump that is not serving a live connection. During an internal
    /// teardown this waits for the handle to finish closing.
    async fn reap_finished_pump(&mut self) {
        let stale = self.pump.is_some() && self.state() != ConnectionState::Connected;
        if stale {
            if let Some(pump) = self.pump.take() {
                pump.cancel.cancel();
                let _ = join_pump(pump.task).await;
            }
        }
    }
}

async fn join_pump(task: JoinHandle<PumpExit>) -> Option<PumpExit> {
    match task.await {
        Ok(exit) => Some(exit),
        Err(e) => {
            tlog!("[connection] Read pump panicked: {:?}", e);
            None
        }
    }
}

// ============================================================================
// Read Pump
// ============================================================================

/// Read chunks until cancelled, end of stream or error. Always closes the handle.
/// On EOF or error the pump performs the internal disconnect itself.
async fn run_pump(
    mut handle: Box<dyn TransportHandle>,
    mut framer: LineFramer,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) -> PumpExit {
    let exit = loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpExit::Cancelled,
            read = handle.read_chunk() => read,
        };

        match read {
            Ok(Some(chunk)) => process_chunk(&mut framer, &chunk, &shared),
            Ok(None) => break PumpExit::EndOfStream,
            Err(e) => break PumpExit::ReadError(e),
        }
    };

    if !framer.pending().is_empty() {
        tlog!(
            "[connection] Dropping {} bytes of unterminated input",
            framer.pending().len()
        );
    }

    if exit == PumpExit::Cancelled {
        // The manager owns the state transitions for a requested disconnect
        handle.close().await;
        return exit;
    }

    // Internal disconnect: same effect as a user-requested one
    shared.set_state(ConnectionState::Disconnecting);
    handle.close().await;
    shared.indicator.set_connected(false, None);
    match &exit {
        PumpExit::ReadError(e) => {
            tlog!("[connection] Read failed: {}", e);
            shared.reporter.report(&format!("Serial read error: {}", e));
        }
        _ => tlog!("[connection] {} closed the stream", handle.device()),
    }
    shared.set_state(ConnectionState::Disconnected);

    exit
}

/// Frame, decode and deliver one chunk. Synchronous; never suspends.
fn process_chunk(framer: &mut LineFramer, chunk: &str, shared: &Shared) {
    let lines = framer.push(chunk);

    let mut stats = lock(&shared.stats);
    stats.chunks += 1;
    stats.lines += lines.len() as u64;
    stats.oversized = framer.dropped();

    let mut sink = lock(&shared.sink);
    for line in lines {
        match record::decode(&line) {
            Ok(sample) => {
                stats.samples += 1;
                sink.accept(sample);
            }
            Err(rejected) => {
                if rejected.is_reportable() {
                    stats.rejected += 1;
                    tlog!("[record] Skipping line ({}): {}", rejected, line.trim());
                }
            }
        }
    }
}
