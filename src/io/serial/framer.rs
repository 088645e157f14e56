// src/io/serial/framer.rs
//
// Line framing for the text stream coming off the serial port.
// Chunks arrive at arbitrary boundaries; complete lines are emitted in order and
// the unterminated remainder is carried into the next push.

/// Line terminator used on the wire
pub const LINE_TERMINATOR: char = '\n';

/// Default cap on the unterminated remainder (characters)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

// =============================================================================
// LineFramer
// =============================================================================

/// Stateful line framer for streaming text.
///
/// The retained buffer never contains a terminator between pushes. Whatever is
/// left in it when the framer is dropped is discarded, never emitted.
pub struct LineFramer {
    buffer: String,
    /// Remainder longer than this is dropped (a device that never sends `\n`)
    max_length: usize,
    /// Set after an oversized remainder is dropped; cleared at the next terminator
    discarding: bool,
    dropped: u64,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineFramer {
    pub fn new(max_length: usize) -> Self {
        LineFramer {
            buffer: String::new(),
            max_length: max_length.max(1),
            discarding: false,
            dropped: 0,
        }
    }

    /// Append a chunk and return every line it completed, in order.
    /// Emitted lines never contain the terminator.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut lines: Vec<String> = self
            .buffer
            .split(LINE_TERMINATOR)
            .map(str::to_string)
            .collect();
        // split always yields at least one segment; the last one is the new remainder
        self.buffer = lines.pop().unwrap_or_default();

        if self.discarding {
            if lines.is_empty() {
                // Still inside the dropped line
                self.buffer.clear();
                return lines;
            }
            // Tail of the dropped line, up to its terminator
            lines.remove(0);
            self.discarding = false;
        }

        if self.buffer.chars().count() > self.max_length {
            tlog!(
                "[framer] Discarding {} unterminated bytes (max line length {})",
                self.buffer.len(),
                self.max_length
            );
            self.buffer.clear();
            self.discarding = true;
            self.dropped += 1;
        }

        lines
    }

    /// Unterminated text carried over from the last push
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Number of oversized remainders discarded so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
