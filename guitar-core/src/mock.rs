//! In-memory doubles of every resource trait, for host tests.

extern crate std;

use std::collections::{BTreeMap, VecDeque};
use std::string::{String, ToString};
use std::vec;
use std::vec::Vec;

use serde_json::json;

use crate::document::{DeviceConfig, UserPresets};
use crate::engine::Engine;
use crate::lighting::Lighting;
use crate::resources::{
    AnalogInput, ButtonRegistry, FileStore, HardwareError, Joystick, LedStrip, Peripherals,
    PinDetector, SerialError, SerialPort, StorageError, SystemControl,
};
use crate::types::{PinName, Rgb};

/// Serial port fed from a byte queue, capturing everything written.
#[derive(Default)]
pub struct ScriptedSerial {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    pub fail_writes: bool,
}

impl ScriptedSerial {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Everything written since the last call.
    pub fn take_output(&mut self) -> String {
        String::from_utf8(core::mem::take(&mut self.output)).unwrap()
    }
}

impl SerialPort for ScriptedSerial {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        if self.fail_writes {
            return Err(SerialError::Disconnected);
        }
        self.output.extend_from_slice(bytes);
        Ok(())
    }
}

/// LED strip recording pixels, latches and release.
pub struct MockStrip {
    pub pixels: Vec<Rgb>,
    pub shows: usize,
    pub released: bool,
}

impl MockStrip {
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![Rgb::OFF; len],
            shows: 0,
            released: false,
        }
    }
}

impl LedStrip for MockStrip {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn get(&self, index: usize) -> Option<Rgb> {
        self.pixels.get(index).copied()
    }

    fn show(&mut self) {
        self.shows += 1;
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Button registry backed by a key to pin level map.
#[derive(Default)]
pub struct MockButtons {
    pub levels: BTreeMap<String, bool>,
    pub releases: usize,
    pub reinits: usize,
    pub fail_reinit: bool,
}

impl MockButtons {
    pub fn with_levels(levels: &[(&str, bool)]) -> Self {
        Self {
            levels: levels
                .iter()
                .map(|(key, level)| (key.to_string(), *level))
                .collect(),
            ..Self::default()
        }
    }
}

impl ButtonRegistry for MockButtons {
    fn read(&mut self, key: &str) -> Option<bool> {
        self.levels.get(key).copied()
    }

    fn release_all(&mut self) {
        self.releases += 1;
    }

    fn reinit(&mut self, _config: &DeviceConfig) -> Result<(), HardwareError> {
        if self.fail_reinit {
            return Err(HardwareError::PinInUse);
        }
        self.reinits += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockAnalog {
    pub value: u16,
    pub released: bool,
}

impl MockAnalog {
    pub fn new(value: u16) -> Self {
        Self {
            value,
            released: false,
        }
    }
}

impl AnalogInput for MockAnalog {
    fn read(&mut self) -> u16 {
        self.value
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// File store over a path to contents map.
#[derive(Default)]
pub struct MemFiles {
    pub files: BTreeMap<String, String>,
    pub fail_writes: bool,
    pub writes: usize,
}

impl MemFiles {
    pub fn insert(&mut self, path: &str, contents: &str) {
        self.files.insert(path.to_string(), contents.to_string());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

impl FileStore for MemFiles {
    fn read_to_string(&mut self, path: &str) -> Result<String, StorageError> {
        self.files.get(path).cloned().ok_or(StorageError::NotFound)
    }

    fn write(&mut self, path: &str, contents: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::NoSpace);
        }
        self.writes += 1;
        self.insert(path, contents);
        Ok(())
    }
}

/// Pin detector returning a fixed answer and recording its calls.
#[derive(Default)]
pub struct ScriptedDetector {
    pub answer: Option<&'static str>,
    pub calls: Vec<(String, u32)>,
    pub cancels: usize,
}

impl PinDetector for ScriptedDetector {
    fn detect(&mut self, button: &str, timeout_secs: u32) -> Option<PinName> {
        self.calls.push((button.to_string(), timeout_secs));
        self.answer.and_then(|pin| PinName::try_from(pin).ok())
    }

    fn cancel(&mut self) {
        self.cancels += 1;
    }
}

/// System controller counting resets instead of performing them.
pub struct RecordingSystem {
    pub resets: usize,
    pub bootloader_resets: usize,
    pub uid: Vec<u8>,
    pub fail: bool,
}

impl Default for RecordingSystem {
    fn default() -> Self {
        Self {
            resets: 0,
            bootloader_resets: 0,
            uid: vec![0xE6, 0x61, 0x38, 0x52, 0x03, 0x4B, 0x2A, 0x1F],
            fail: false,
        }
    }
}

impl SystemControl for RecordingSystem {
    fn reset(&mut self) -> Result<(), HardwareError> {
        if self.fail {
            return Err(HardwareError::Unsupported);
        }
        self.resets += 1;
        Ok(())
    }

    fn reset_to_bootloader(&mut self) -> Result<(), HardwareError> {
        if self.fail {
            return Err(HardwareError::Unsupported);
        }
        self.bootloader_resets += 1;
        Ok(())
    }

    fn unique_id(&mut self) -> Result<&[u8], HardwareError> {
        if self.fail {
            return Err(HardwareError::Unsupported);
        }
        Ok(self.uid.as_slice())
    }
}

/// A complete device: every resource double plus the in-memory documents.
pub struct Rig {
    pub serial: ScriptedSerial,
    pub strip: MockStrip,
    pub buttons: MockButtons,
    pub whammy: MockAnalog,
    pub joystick_x: MockAnalog,
    pub joystick_y: MockAnalog,
    pub files: MemFiles,
    pub detector: ScriptedDetector,
    pub system: RecordingSystem,
    pub config: DeviceConfig,
    pub presets: UserPresets,
    pub lighting: Lighting,
    pub has_leds: bool,
    pub has_whammy: bool,
    pub has_joystick: bool,
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}

impl Rig {
    /// Seven button LEDs at indices 0..7, a few wired buttons, all inputs fitted.
    pub fn new() -> Self {
        let serde_json::Value::Object(doc) = json!({
            "GREEN_FRET": "GP10",
            "RED_FRET": "GP11",
            "START": "GP2",
            "GREEN_FRET_led": 0,
            "RED_FRET_led": 1,
            "YELLOW_FRET_led": 2,
            "BLUE_FRET_led": 3,
            "ORANGE_FRET_led": 4,
            "STRUM_UP_led": 5,
            "STRUM_DOWN_led": 6,
        }) else {
            unreachable!()
        };
        Self {
            serial: ScriptedSerial::default(),
            strip: MockStrip::new(7),
            buttons: MockButtons::with_levels(&[
                ("GREEN_FRET", true),
                ("RED_FRET", false),
                ("START", true),
            ]),
            whammy: MockAnalog::new(32768),
            joystick_x: MockAnalog::new(100),
            joystick_y: MockAnalog::new(65535),
            files: MemFiles::default(),
            detector: ScriptedDetector::default(),
            system: RecordingSystem::default(),
            config: DeviceConfig::new(doc),
            presets: UserPresets::default(),
            lighting: Lighting::default(),
            has_leds: true,
            has_whammy: true,
            has_joystick: true,
        }
    }

    pub fn peripherals(&mut self) -> Peripherals<'_> {
        Peripherals {
            serial: &mut self.serial,
            leds: if self.has_leds {
                Some(&mut self.strip as &mut dyn LedStrip)
            } else {
                None
            },
            buttons: &mut self.buttons,
            whammy: if self.has_whammy {
                Some(&mut self.whammy as &mut dyn AnalogInput)
            } else {
                None
            },
            joystick: if self.has_joystick {
                Some(Joystick {
                    x: &mut self.joystick_x,
                    y: &mut self.joystick_y,
                })
            } else {
                None
            },
            files: &mut self.files,
            pin_detector: &mut self.detector,
            system: &mut self.system,
            config: &mut self.config,
            presets: &mut self.presets,
            lighting: &mut self.lighting,
        }
    }

    /// Queue `input` and poll until every byte has been consumed.
    pub fn run(&mut self, engine: &mut Engine, input: &[u8]) -> String {
        self.serial.feed(input);
        while !self.serial.input.is_empty() {
            engine.poll(&mut self.peripherals());
        }
        self.serial.take_output()
    }

    /// [`run`](Self::run) for text input.
    pub fn send(&mut self, engine: &mut Engine, input: &str) -> String {
        self.run(engine, input.as_bytes())
    }
}
