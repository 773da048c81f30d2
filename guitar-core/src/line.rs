//! Line assembly from the raw serial byte stream.

use alloc::string::String;

use crate::error::EngineError;

/// Maximum accepted line length in bytes, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Outcome of feeding a newline to the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineEvent {
    /// A full line is buffered and ready for [`LineAssembler::take`].
    Complete,
    /// The line exceeded [`MAX_LINE_LENGTH`] and was dropped.
    Overflow,
}

/// Accumulates bytes between `\n` delimiters.
///
/// A line that outgrows the buffer is discarded up to its terminating
/// newline so the stream resynchronises on the next line instead of
/// interpreting the tail as a new command.
pub struct LineAssembler {
    buffer: heapless::Vec<u8, MAX_LINE_LENGTH>,
    limit: usize,
    discarding: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LineAssembler {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_limit(MAX_LINE_LENGTH)
    }

    /// Assembler accepting lines of at most `limit` bytes, capped at [`MAX_LINE_LENGTH`].
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            buffer: heapless::Vec::new(),
            limit: if limit < MAX_LINE_LENGTH {
                limit
            } else {
                MAX_LINE_LENGTH
            },
            discarding: false,
        }
    }

    /// Feed one byte. Returns an event when `byte` terminates a line.
    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        if byte == b'\n' {
            if self.discarding {
                self.discarding = false;
                return Some(LineEvent::Overflow);
            }
            return Some(LineEvent::Complete);
        }

        if self.discarding {
            return None;
        }
        if self.buffer.len() >= self.limit || self.buffer.push(byte).is_err() {
            self.buffer.clear();
            self.discarding = true;
        }
        None
    }

    /// Take the buffered line with trailing `\r`/`\n` stripped, leaving the buffer empty.
    pub fn take(&mut self) -> Result<String, EngineError> {
        let line = core::str::from_utf8(&self.buffer)
            .map(|s| String::from(s.trim_end_matches(['\r', '\n'])))
            .map_err(|_| EngineError::InvalidUtf8);
        self.buffer.clear();
        line
    }

    /// Drop any partial line, including one being discarded.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// Number of buffered bytes of the current partial line.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Spots one exact line in a byte stream without buffering it.
///
/// Used where the stream is consumed elsewhere but a single line must be
/// noticed early, such as a cancel request arriving while the engine is busy.
pub struct LineWatch {
    target: &'static [u8],
    matched: Option<usize>,
}

impl LineWatch {
    #[must_use]
    pub const fn new(target: &'static str) -> Self {
        Self {
            target: target.as_bytes(),
            matched: Some(0),
        }
    }

    /// Feed a chunk; `true` if it completed at least one matching line.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        let mut hit = false;
        for &byte in bytes {
            match byte {
                b'\n' => {
                    hit |= self.matched == Some(self.target.len());
                    self.matched = Some(0);
                }
                b'\r' => {}
                _ => {
                    self.matched = self
                        .matched
                        .filter(|&n| self.target.get(n) == Some(&byte))
                        .map(|n| n + 1);
                }
            }
        }
        hit
    }
}
