//! Serial configuration protocol for a USB guitar controller.
//!
//! This crate holds everything about the controller that does not depend
//! on a particular chip. It builds for `no_std` targets with a heap and
//! runs on the host for testing.
//!
//! # Overview
//!
//! - [`engine`]: the cooperative, line-oriented command dispatcher ([`Engine`])
//! - [`command`]: single-step parsing of command lines ([`Command`])
//! - [`session`]: state of multi-line file transfers ([`Session`])
//! - [`response`]: status lines sent back to the host ([`Response`])
//! - [`resources`]: hardware traits the firmware implements ([`Peripherals`])
//! - [`document`]: the config and user preset JSON documents
//! - [`lighting`]: button LED rendering and the tilt wave effect
//!
//! # Protocol
//!
//! Commands are newline-terminated ASCII lines; each produces zero or more
//! newline-terminated status lines:
//!
//! ```text
//! > SETLED:0:10:20:30
//! < SETLED:0:OK
//! > WRITEFILE:notes.txt
//! > hello
//! > END
//! < OK: File /notes.txt written
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt (for embedded logging)
//! - **`log`**: Log through the `log` facade

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod command;
pub mod document;
pub mod engine;
pub mod error;
pub mod lighting;
pub mod line;
pub mod resources;
pub mod response;
pub mod session;
pub mod types;

#[cfg(test)]
mod mock;

// Re-export main types at crate root
pub use command::{Command, CommandError, CANCEL_PIN_DETECT};
pub use document::{DeviceConfig, UserPresets};
pub use engine::{Engine, EngineConfig, DEFAULT_BYTE_BUDGET, PIN_DETECT_TIMEOUT_SECS};
pub use error::EngineError;
pub use lighting::{render_buttons, Lighting};
pub use line::{LineWatch, MAX_LINE_LENGTH};
pub use resources::{
    AnalogInput, ButtonRegistry, FileStore, HardwareError, Joystick, LedStrip, Peripherals,
    PinDetector, SerialError, SerialPort, StorageError, SystemControl,
};
pub use response::Response;
pub use session::{Mode, PayloadKind, Session};
pub use types::{FilePath, GuitarButtons, LedRole, PinName, Rgb};
