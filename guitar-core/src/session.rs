//! Modal session state for multi-line file transfers.

use alloc::string::String;
use alloc::vec::Vec;

use crate::types::FilePath;

/// Sentinel line that ends a payload.
pub const END_MARKER: &str = "END";

/// How a finished payload is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadKind {
    /// Overwrite the target file with the payload.
    Replace,
    /// Merge the payload's JSON object into the target document.
    MergeJson,
}

/// Current mode of the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    AwaitingPayload { kind: PayloadKind, path: FilePath },
}

/// A payload taken out of a finished session.
#[derive(Debug)]
pub struct Payload {
    pub kind: PayloadKind,
    pub path: FilePath,
    pub lines: Vec<String>,
}

impl Payload {
    /// Payload text with lines joined by `\n` (no trailing newline).
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Session state persisting across engine invocations.
///
/// `pending_lines` only holds lines while a payload is being received.
#[derive(Debug, Default)]
pub struct Session {
    mode: Mode,
    pending_lines: Vec<String>,
}

impl Session {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mode::Idle,
            pending_lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    #[must_use]
    pub fn pending_lines(&self) -> &[String] {
        &self.pending_lines
    }

    /// Start collecting a payload for `path`, discarding any previous lines.
    pub fn begin(&mut self, kind: PayloadKind, path: FilePath) {
        self.pending_lines.clear();
        self.mode = Mode::AwaitingPayload { kind, path };
    }

    /// Append a payload line. Ignored while idle.
    pub fn push_line(&mut self, line: String) {
        if !self.is_idle() {
            self.pending_lines.push(line);
        }
    }

    /// Return to idle and hand back the collected payload, if any.
    pub fn finish(&mut self) -> Option<Payload> {
        let lines = core::mem::take(&mut self.pending_lines);
        match core::mem::take(&mut self.mode) {
            Mode::Idle => None,
            Mode::AwaitingPayload { kind, path } => Some(Payload { kind, path, lines }),
        }
    }

    /// Force the session back to idle with no payload.
    pub fn reset(&mut self) {
        self.mode = Mode::Idle;
        self.pending_lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_push_finish() {
        let mut session = Session::new();
        session.begin(PayloadKind::Replace, FilePath::from_wire("a.json"));
        session.push_line(String::from("{"));
        session.push_line(String::from("}"));
        assert_eq!(session.pending_lines().len(), 2);

        let payload = session.finish().unwrap();
        assert_eq!(payload.kind, PayloadKind::Replace);
        assert_eq!(payload.path.as_str(), "/a.json");
        assert_eq!(payload.text(), "{\n}");
        assert!(session.is_idle());
        assert!(session.pending_lines().is_empty());
    }

    #[test]
    fn test_idle_ignores_lines() {
        let mut session = Session::new();
        session.push_line(String::from("stray"));
        assert!(session.pending_lines().is_empty());
        assert!(session.finish().is_none());
    }

    #[test]
    fn test_begin_clears_previous_payload() {
        let mut session = Session::new();
        session.begin(PayloadKind::Replace, FilePath::from_wire("a.txt"));
        session.push_line(String::from("old"));
        session.begin(PayloadKind::MergeJson, FilePath::user_presets());
        assert!(session.pending_lines().is_empty());
        assert!(matches!(
            session.mode(),
            Mode::AwaitingPayload {
                kind: PayloadKind::MergeJson,
                ..
            }
        ));
    }

    #[test]
    fn test_reset() {
        let mut session = Session::new();
        session.begin(PayloadKind::Replace, FilePath::config());
        session.push_line(String::from("{}"));
        session.reset();
        assert!(session.is_idle());
        assert!(session.pending_lines().is_empty());
    }
}
