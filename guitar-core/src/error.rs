//! Engine-level error type.

use core::fmt;

use crate::resources::{HardwareError, SerialError, StorageError};

/// Failure while handling a line.
///
/// Command handlers report most failures inline; an `EngineError` that
/// escapes a handler reaches the engine's crash boundary, which resets the
/// session.
#[derive(Debug)]
pub enum EngineError {
    Serial(SerialError),
    Storage(StorageError),
    Hardware(HardwareError),
    Json(serde_json::Error),
    /// Received line is not valid UTF-8.
    InvalidUtf8,
    /// Received line exceeded the line buffer.
    LineTooLong,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Serial(e) => fmt::Display::fmt(e, f),
            EngineError::Storage(e) => fmt::Display::fmt(e, f),
            EngineError::Hardware(e) => fmt::Display::fmt(e, f),
            EngineError::Json(e) => fmt::Display::fmt(e, f),
            EngineError::InvalidUtf8 => f.write_str("invalid UTF-8 in line"),
            EngineError::LineTooLong => f.write_str("line too long"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EngineError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", defmt::Display2Format(self))
    }
}

impl From<SerialError> for EngineError {
    fn from(err: SerialError) -> Self {
        EngineError::Serial(err)
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::Storage(err)
    }
}

impl From<HardwareError> for EngineError {
    fn from(err: HardwareError) -> Self {
        EngineError::Hardware(err)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Json(err)
    }
}
