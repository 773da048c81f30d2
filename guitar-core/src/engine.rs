//! The serial command protocol engine.
//!
//! [`Engine::poll`] is called once per main-loop iteration. It drains at
//! most [`EngineConfig::byte_budget`] bytes from the serial port, handles
//! every line those bytes complete, and returns. Multi-line file transfers
//! span many calls; their progress lives in the engine's [`Session`].
//!
//! # Error Handling
//!
//! Command failures are answered inline and never change the session.
//! Anything that escapes a handler (a failed serial write, a line that is
//! not UTF-8 or is too long, buttons that cannot be reinitialised) reaches
//! the crash boundary in [`Engine::poll`]: the line buffer and the session
//! are reset, `ERROR: Serial crash: <msg>` is sent, and the next call starts
//! clean.

use alloc::string::String;

use crate::command::{is_preview, Command, CommandError};
use crate::document::{self, read_document_or_empty, write_document};
use crate::error::EngineError;
use crate::lighting::render_buttons;
use crate::line::{LineAssembler, LineEvent, MAX_LINE_LENGTH};
use crate::resources::{HardwareError, Peripherals};
use crate::response::{send, send_raw_line, Response};
use crate::session::{Payload, PayloadKind, Session, END_MARKER};
use crate::types::{FilePath, GuitarButtons, LedRole, Rgb, CONFIG_PATH};

/// Bytes consumed per [`Engine::poll`] by default.
pub const DEFAULT_BYTE_BUDGET: usize = 8;

/// Seconds pin detection waits for a button press.
pub const PIN_DETECT_TIMEOUT_SECS: u32 = 10;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Maximum bytes read per poll. Values below 1 are treated as 1.
    pub byte_budget: usize,
    /// Longest accepted line, capped at [`MAX_LINE_LENGTH`].
    pub max_line_length: usize,
    pub pin_detect_timeout_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            byte_budget: DEFAULT_BYTE_BUDGET,
            max_line_length: MAX_LINE_LENGTH,
            pin_detect_timeout_secs: PIN_DETECT_TIMEOUT_SECS,
        }
    }
}

/// Line-oriented, modal command dispatcher.
pub struct Engine {
    config: EngineConfig,
    line: LineAssembler,
    session: Session,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            line: LineAssembler::with_limit(config.max_line_length),
            session: Session::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Bytes of the partial line received so far.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.line.len()
    }

    /// Run one bounded step of the protocol.
    ///
    /// Never blocks on serial input and never fails; see the module docs
    /// for how errors are contained.
    pub fn poll(&mut self, hw: &mut Peripherals<'_>) {
        for _ in 0..self.config.byte_budget.max(1) {
            let Some(byte) = hw.serial.read_byte() else {
                return;
            };

            let result = match self.line.push(byte) {
                None => continue,
                Some(LineEvent::Complete) => self
                    .line
                    .take()
                    .and_then(|line| self.handle_line(&line, hw)),
                Some(LineEvent::Overflow) => Err(EngineError::LineTooLong),
            };

            if let Err(e) = result {
                self.recover(&e, hw);
                return;
            }
        }
    }

    fn recover(&mut self, err: &EngineError, hw: &mut Peripherals<'_>) {
        error!("Serial handler crashed: {}", err);
        self.line.clear();
        self.session.reset();
        if send(hw.serial, &Response::SerialCrash(err)).is_err() {
            warn!("Could not report crash to host");
        }
    }

    fn handle_line(&mut self, line: &str, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
        debug!("Received line: {}", line);

        if is_preview(line) {
            match Command::parse(line) {
                Ok(Command::PreviewLed { role, color }) => preview_led(role, color, hw),
                Ok(_) => {}
                Err(e) => warn!("PREVIEWLED failed: {}", e),
            }
            if !self.session.is_idle() {
                self.session.push_line(String::from(line));
            }
            return Ok(());
        }

        if !self.session.is_idle() {
            if line == END_MARKER {
                if let Some(payload) = self.session.finish() {
                    return apply_payload(&payload, hw);
                }
            } else {
                self.session.push_line(String::from(line));
            }
            return Ok(());
        }

        match Command::parse(line) {
            Ok(command) => self.dispatch(command, hw),
            Err(e) => reject(e, hw),
        }
    }

    fn dispatch(&mut self, command: Command<'_>, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
        match command {
            Command::DetectPin { button } => self.detect_pin(button, hw),
            Command::SavePin { button, pin } => {
                match document::save_pin(hw.files, CONFIG_PATH, button, pin) {
                    Ok(()) => {
                        hw.config.set_pin(button, pin);
                        info!("Saved pin {} for {}", pin, button);
                        send(hw.serial, &Response::PinSaved { button, pin })?;
                    }
                    Err(e) => send(hw.serial, &Response::PinDetectError(&e))?,
                }
                Ok(())
            }
            Command::CancelPinDetect => {
                hw.pin_detector.cancel();
                send(hw.serial, &Response::PinDetectCancelled)?;
                Ok(())
            }
            Command::PreviewLed { role, color } => {
                preview_led(role, color, hw);
                Ok(())
            }
            Command::ReadFile { path } => read_file(&path, hw),
            Command::ReadWhammy => {
                let value = hw.whammy.as_deref_mut().map(|whammy| whammy.read());
                send(hw.serial, &Response::Whammy(value))?;
                Ok(())
            }
            Command::ReadJoystick => {
                let value = hw
                    .joystick
                    .as_mut()
                    .map(|joystick| (joystick.x.read(), joystick.y.read()));
                send(hw.serial, &Response::Joystick(value))?;
                Ok(())
            }
            Command::WriteFile { path } => {
                info!("Starting write to {}", path.as_str());
                self.session.begin(PayloadKind::Replace, path);
                Ok(())
            }
            Command::ImportUser => {
                info!("Starting user preset merge");
                self.session
                    .begin(PayloadKind::MergeJson, FilePath::user_presets());
                Ok(())
            }
            Command::ReadPin { key } => {
                let pressed = hw.buttons.is_pressed(key);
                send(hw.serial, &Response::Pin { key, pressed })?;
                Ok(())
            }
            Command::TiltWave => {
                hw.lighting.start_tilt_wave();
                send(hw.serial, &Response::TiltWaveStarted)?;
                Ok(())
            }
            Command::SetLed { index, color } => {
                let ok = set_led(index, color, hw);
                send(hw.serial, &Response::SetLed { index, ok })?;
                Ok(())
            }
            Command::LedRestore => {
                hw.lighting.stop();
                let buttons = GuitarButtons::sample(hw.buttons);
                match hw.leds.as_deref_mut() {
                    Some(leds) => {
                        render_buttons(leds, buttons, hw.config, hw.presets);
                        send(hw.serial, &Response::LedRestored)?;
                    }
                    None => send(
                        hw.serial,
                        &Response::LedRestoreFailed(&HardwareError::NotPresent),
                    )?,
                }
                Ok(())
            }
            Command::TiltWaveEnable(enabled) => {
                hw.config.set_tilt_wave_enabled(enabled);
                hw.lighting.set_enabled(enabled);
                send(hw.serial, &Response::TiltWaveEnabled(enabled))?;
                Ok(())
            }
            Command::RebootBootsel => {
                let acked = send(hw.serial, &Response::RebootingToBootloader);
                if let Err(e) = hw.system.reset_to_bootloader() {
                    error!("BOOTSEL reboot failed: {}", e);
                    acked?;
                    send(hw.serial, &Response::BootloaderFailed(&e))?;
                }
                acked?;
                Ok(())
            }
            Command::Reboot => {
                let acked = send(hw.serial, &Response::Rebooting);
                if let Err(e) = hw.system.reset() {
                    error!("Reboot failed: {}", e);
                    acked?;
                    send(hw.serial, &Response::RebootFailed(&e))?;
                }
                acked?;
                Ok(())
            }
            Command::ReadUid => {
                match hw.system.unique_id() {
                    Ok(id) => send(hw.serial, &Response::UniqueId(id))?,
                    Err(e) => send(hw.serial, &Response::Error(&e))?,
                }
                send(hw.serial, &Response::End)?;
                Ok(())
            }
        }
    }

    /// Free the button pins, probe for the pressed one, then restore the buttons.
    ///
    /// The buttons are reinitialised even when reporting fails; a reinit
    /// failure leaves the device without working buttons and is escalated.
    fn detect_pin(&mut self, button: &str, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
        hw.buttons.release_all();

        let reported = send(hw.serial, &Response::PinDetectStart(button)).and_then(|()| {
            match hw
                .pin_detector
                .detect(button, self.config.pin_detect_timeout_secs)
            {
                Some(pin) => send(
                    hw.serial,
                    &Response::PinDetected {
                        button,
                        pin: pin.as_str(),
                    },
                ),
                None => send(hw.serial, &Response::PinNotFound(button)),
            }
        });

        let restored = hw.buttons.reinit(hw.config);
        reported?;
        restored?;
        Ok(())
    }
}

fn reject(err: CommandError, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
    let response = match err {
        CommandError::Unknown => Response::UnknownCommand,
        CommandError::SavePinFormat => Response::PinDetectError(&err),
        CommandError::SetLedFormat => Response::InvalidSetLedFormat,
        CommandError::SetLedNumber => Response::SetLedFailed(&err),
        CommandError::PreviewFormat | CommandError::PreviewRole | CommandError::PreviewColor => {
            warn!("PREVIEWLED failed: {}", err);
            return Ok(());
        }
    };
    send(hw.serial, &response)?;
    Ok(())
}

/// Best-effort live colour preview; misses are only logged.
fn preview_led(role: LedRole, color: Rgb, hw: &mut Peripherals<'_>) {
    let Some(index) = hw.config.led_index(role) else {
        warn!("LED not found for key: {}", role.led_key());
        return;
    };
    let Some(leds) = hw.leds.as_deref_mut() else {
        warn!("PREVIEWLED ignored, no LED strip");
        return;
    };
    if index >= leds.len() {
        warn!("PREVIEWLED index {} outside strip", index);
        return;
    }
    leds.set(index, color);
    leds.show();
    debug!("PREVIEWLED applied to {}", role.preview_name());
}

/// Write one LED if the index and colour are valid; returns whether it was written.
fn set_led(index: i32, color: Option<Rgb>, hw: &mut Peripherals<'_>) -> bool {
    let (Some(leds), Ok(index), Some(color)) =
        (hw.leds.as_deref_mut(), usize::try_from(index), color)
    else {
        return false;
    };
    if index >= leds.len() {
        return false;
    }
    leds.set(index, color);
    leds.show();
    true
}

fn read_file(path: &FilePath, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
    match hw.files.read_to_string(path.as_str()) {
        Ok(text) => {
            for line in text.split_inclusive('\n') {
                send_raw_line(hw.serial, line)?;
            }
        }
        Err(e) => send(hw.serial, &Response::Error(&e))?,
    }
    send(hw.serial, &Response::End)?;
    Ok(())
}

fn apply_payload(payload: &Payload, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
    match payload.kind {
        PayloadKind::Replace => replace_file(payload, hw),
        PayloadKind::MergeJson => merge_file(payload, hw),
    }
}

/// Finish a `WRITEFILE` session.
fn replace_file(payload: &Payload, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
    let path = &payload.path;
    let mut raw = payload.text();

    let parsed = if path.is_json() {
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Rejected {}: invalid JSON", path.as_str());
                send(hw.serial, &Response::WriteFailed { path, error: &e })?;
                return Ok(());
            }
        }
    } else {
        None
    };

    raw.push('\n');
    if let Err(e) = hw.files.write(path.as_str(), &raw) {
        error!("Failed to write {}: {}", path.as_str(), e);
        send(hw.serial, &Response::WriteFailed { path, error: &e })?;
        return Ok(());
    }
    info!("File {} written", path.as_str());
    // The file is on disk; what follows runs even if the host is gone.
    let acked = send(hw.serial, &Response::FileWritten(path));

    if path.is_config() {
        info!("Config replaced, releasing hardware and resetting");
        hw.release_all();
        if let Err(e) = hw.system.reset() {
            error!("Reset after config write failed: {}", e);
            acked?;
            send(hw.serial, &Response::RebootFailed(&e))?;
        }
    } else if path.is_user_presets() {
        let document = match parsed {
            Some(serde_json::Value::Object(map)) => map,
            _ => document::Document::new(),
        };
        hw.presets.replace(document);
    }
    acked?;
    Ok(())
}

/// Finish an `IMPORTUSER` session.
fn merge_file(payload: &Payload, hw: &mut Peripherals<'_>) -> Result<(), EngineError> {
    let path = &payload.path;
    let incoming = match document::parse_document(&payload.text()) {
        Ok(doc) => doc,
        Err(e) => {
            error!("Merge failed: invalid JSON payload");
            send(hw.serial, &Response::Error(&e))?;
            return Ok(());
        }
    };

    let mut merged = read_document_or_empty(hw.files, path.as_str());
    document::merge(&mut merged, incoming);
    if let Err(e) = write_document(hw.files, path.as_str(), &merged) {
        error!("Merge failed: {}", e);
        send(hw.serial, &Response::Error(&e))?;
        return Ok(());
    }

    hw.presets.replace(merged);
    info!("Merged into {}", path.as_str());
    send(hw.serial, &Response::Merged(path))?;
    Ok(())
}
