//! Hardware and resource traits the protocol engine drives.
//!
//! The surrounding firmware owns every resource and lends them to the
//! engine for one [`Engine::poll`](crate::Engine::poll) through
//! [`Peripherals`]. Access is single-threaded; none of these traits
//! require internal locking.

use alloc::string::String;
use core::fmt;

use crate::document::{DeviceConfig, UserPresets};
use crate::lighting::Lighting;
use crate::types::{PinName, Rgb};

/// Error type for serial channel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// Host is not connected (DTR low or USB not configured).
    Disconnected,
    /// Transmit path stayed full for too long.
    Timeout,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SerialError::Disconnected => "serial disconnected",
            SerialError::Timeout => "serial write timed out",
        })
    }
}

/// Error type for file store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No file with that path.
    NotFound,
    /// File contents are not valid UTF-8.
    Corrupt,
    /// File does not fit in its storage slot.
    TooLarge,
    /// Every storage slot is already taken.
    NoSpace,
    /// Underlying flash or filesystem failure.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageError::NotFound => "No such file",
            StorageError::Corrupt => "File is not valid UTF-8",
            StorageError::TooLarge => "File too large",
            StorageError::NoSpace => "No space left on device",
            StorageError::Io => "I/O error",
        })
    }
}

/// Error type for GPIO, LED and system control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareError {
    /// A configured pin name does not exist on this board.
    UnknownPin,
    /// The pin is already claimed by another function.
    PinInUse,
    /// Resource was released and not reinitialised.
    Released,
    /// The operation is not available on this device.
    Unsupported,
    /// The device was built or configured without this resource.
    NotPresent,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HardwareError::UnknownPin => "unknown pin",
            HardwareError::PinInUse => "pin in use",
            HardwareError::Released => "resource released",
            HardwareError::Unsupported => "unsupported",
            HardwareError::NotPresent => "resource not present",
        })
    }
}

/// Byte-oriented serial channel to the configuration tool.
pub trait SerialPort {
    /// Take the next received byte without waiting; `None` when nothing is pending.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue `bytes` for transmission.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;
}

/// Addressable RGB LED strip.
///
/// Writes are buffered until [`show`](LedStrip::show) latches them.
pub trait LedStrip {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set the buffered colour at `index`; out-of-range indices are ignored.
    fn set(&mut self, index: usize, color: Rgb);

    fn get(&self, index: usize) -> Option<Rgb>;

    /// Latch the buffered colours to the strip.
    fn show(&mut self);

    /// Release the strip's pin and peripheral ahead of a reset.
    fn release(&mut self);
}

/// Logical button name to hardware pin mapping.
pub trait ButtonRegistry {
    /// Raw digital level of the button's pin; `None` for unknown keys.
    fn read(&mut self, key: &str) -> Option<bool>;

    /// Whether the button is held. Buttons are wired to ground with pull-ups.
    fn is_pressed(&mut self, key: &str) -> Option<bool> {
        self.read(key).map(|level| !level)
    }

    /// Deinitialise every button pin. Pins that are already free are skipped.
    fn release_all(&mut self);

    /// Recreate the pin handles from the configuration document.
    fn reinit(&mut self, config: &DeviceConfig) -> Result<(), HardwareError>;
}

/// Single analog channel (whammy bar, joystick axis).
pub trait AnalogInput {
    /// Current reading scaled to the full 16-bit range.
    fn read(&mut self) -> u16;

    fn release(&mut self);
}

/// Persistent file storage.
pub trait FileStore {
    fn read_to_string(&mut self, path: &str) -> Result<String, StorageError>;

    /// Replace the whole file at `path` with `contents`.
    fn write(&mut self, path: &str, contents: &str) -> Result<(), StorageError>;
}

/// Electrical probe that finds which pin a physical button is wired to.
pub trait PinDetector {
    /// Wait up to `timeout_secs` for a candidate pin to be pulled low.
    fn detect(&mut self, button: &str, timeout_secs: u32) -> Option<PinName>;

    /// Abort a running or pending detection.
    fn cancel(&mut self);
}

/// Reset and identity control of the microcontroller.
pub trait SystemControl {
    /// Hard reset. Real hardware never returns from a successful call.
    fn reset(&mut self) -> Result<(), HardwareError>;

    /// Arm the one-shot firmware-update boot mode and reset.
    fn reset_to_bootloader(&mut self) -> Result<(), HardwareError>;

    /// Factory-programmed unique identifier.
    fn unique_id(&mut self) -> Result<&[u8], HardwareError>;
}

/// Two-axis analog joystick.
pub struct Joystick<'a> {
    pub x: &'a mut dyn AnalogInput,
    pub y: &'a mut dyn AnalogInput,
}

/// Everything the engine may touch during one invocation.
///
/// Optional members model hardware that a given build or configuration
/// does not have; commands addressing them answer with their "absent"
/// replies instead of failing.
pub struct Peripherals<'a> {
    pub serial: &'a mut dyn SerialPort,
    pub leds: Option<&'a mut dyn LedStrip>,
    pub buttons: &'a mut dyn ButtonRegistry,
    pub whammy: Option<&'a mut dyn AnalogInput>,
    pub joystick: Option<Joystick<'a>>,
    pub files: &'a mut dyn FileStore,
    pub pin_detector: &'a mut dyn PinDetector,
    pub system: &'a mut dyn SystemControl,
    pub config: &'a mut DeviceConfig,
    pub presets: &'a mut UserPresets,
    pub lighting: &'a mut Lighting,
}

impl Peripherals<'_> {
    /// Release every hardware resource ahead of a reset.
    ///
    /// Failures here are ignored; the device is about to restart.
    pub fn release_all(&mut self) {
        if let Some(leds) = self.leds.as_deref_mut() {
            leds.release();
        }
        self.buttons.release_all();
        if let Some(whammy) = self.whammy.as_deref_mut() {
            whammy.release();
        }
        if let Some(joystick) = self.joystick.as_mut() {
            joystick.x.release();
            joystick.y.release();
        }
    }
}
