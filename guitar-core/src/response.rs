//! Status lines written back to the configuration tool.
//!
//! Every reply is a single ASCII line. [`Response`] renders the text
//! without its terminator; [`send`] appends the `\n`.

use core::fmt::{self, Write};

use crate::resources::{SerialError, SerialPort};
use crate::session::END_MARKER;
use crate::types::FilePath;

/// One status line.
pub enum Response<'a> {
    PinDetectStart(&'a str),
    PinDetected { button: &'a str, pin: &'a str },
    PinNotFound(&'a str),
    PinSaved { button: &'a str, pin: &'a str },
    PinDetectError(&'a dyn fmt::Display),
    PinDetectCancelled,
    /// End of a multi-line reply.
    End,
    /// Generic `ERROR: <msg>`.
    Error(&'a dyn fmt::Display),
    /// Whammy reading, `None` when no whammy is fitted.
    Whammy(Option<u16>),
    /// Joystick `(x, y)` reading, `None` when no joystick is fitted.
    Joystick(Option<(u16, u16)>),
    /// Digital button state, `None` for an unknown key.
    Pin { key: &'a str, pressed: Option<bool> },
    TiltWaveStarted,
    SetLed { index: i32, ok: bool },
    InvalidSetLedFormat,
    SetLedFailed(&'a dyn fmt::Display),
    LedRestored,
    LedRestoreFailed(&'a dyn fmt::Display),
    TiltWaveEnabled(bool),
    FileWritten(&'a FilePath),
    WriteFailed {
        path: &'a FilePath,
        error: &'a dyn fmt::Display,
    },
    Merged(&'a FilePath),
    RebootingToBootloader,
    BootloaderFailed(&'a dyn fmt::Display),
    Rebooting,
    RebootFailed(&'a dyn fmt::Display),
    /// Unique id as uppercase hex.
    UniqueId(&'a [u8]),
    UnknownCommand,
    SerialCrash(&'a dyn fmt::Display),
}

impl fmt::Display for Response<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::PinDetectStart(button) => write!(f, "PINDETECT:START:{button}"),
            Response::PinDetected { button, pin } => {
                write!(f, "PINDETECT:DETECTED:{button}:{pin}")
            }
            Response::PinNotFound(button) => write!(f, "PINDETECT:NONE:{button}"),
            Response::PinSaved { button, pin } => write!(f, "PINDETECT:SAVED:{button}:{pin}"),
            Response::PinDetectError(e) => write!(f, "PINDETECT:ERROR:{e}"),
            Response::PinDetectCancelled => f.write_str("PINDETECT:CANCELLED"),
            Response::End => f.write_str(END_MARKER),
            Response::Error(e) => write!(f, "ERROR: {e}"),
            Response::Whammy(Some(value)) => write!(f, "WHAMMY:{value}"),
            Response::Whammy(None) => f.write_str("WHAMMY:-1"),
            Response::Joystick(Some((x, y))) => write!(f, "JOYSTICK:X:{x}:Y:{y}"),
            Response::Joystick(None) => f.write_str("JOYSTICK:X:-1:Y:-1"),
            Response::Pin {
                key,
                pressed: Some(pressed),
            } => write!(f, "PIN:{key}:{}", u8::from(*pressed)),
            Response::Pin { key, pressed: None } => write!(f, "PIN:{key}:ERR"),
            Response::TiltWaveStarted => f.write_str("TILTWAVE:STARTED"),
            Response::SetLed { index, ok: true } => write!(f, "SETLED:{index}:OK"),
            Response::SetLed { index, ok: false } => write!(f, "SETLED:{index}:ERR"),
            Response::InvalidSetLedFormat => f.write_str("ERROR: Invalid SETLED format"),
            Response::SetLedFailed(e) => write!(f, "ERROR: SETLED command failed: {e}"),
            Response::LedRestored => f.write_str("LEDRESTORE:OK"),
            Response::LedRestoreFailed(e) => write!(f, "ERROR: LED restore failed: {e}"),
            Response::TiltWaveEnabled(true) => f.write_str("TILTWAVE_ENABLE:True"),
            Response::TiltWaveEnabled(false) => f.write_str("TILTWAVE_ENABLE:False"),
            Response::FileWritten(path) => write!(f, "OK: File {path} written"),
            Response::WriteFailed { path, error } => {
                write!(f, "ERROR: Failed to write {path}: {error}")
            }
            Response::Merged(path) => write!(f, "OK: Merged into {path}"),
            Response::RebootingToBootloader => f.write_str("Rebooting to BOOTSEL mode..."),
            Response::BootloaderFailed(e) => write!(f, "ERROR: Failed to reboot to BOOTSEL: {e}"),
            Response::Rebooting => f.write_str("Rebooting..."),
            Response::RebootFailed(e) => write!(f, "ERROR: Failed to reboot: {e}"),
            Response::UniqueId(id) => id.iter().try_for_each(|b| write!(f, "{b:02X}")),
            Response::UnknownCommand => f.write_str("ERROR: Unknown command"),
            Response::SerialCrash(e) => write!(f, "ERROR: Serial crash: {e}"),
        }
    }
}

/// `fmt::Write` adapter that remembers the serial error behind a `fmt::Error`.
struct PortWriter<'p> {
    port: &'p mut dyn SerialPort,
    error: Option<SerialError>,
}

impl Write for PortWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.port.write_all(s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}

/// Write `response` followed by `\n`.
pub fn send(port: &mut dyn SerialPort, response: &Response<'_>) -> Result<(), SerialError> {
    let mut writer = PortWriter { port, error: None };
    writeln!(writer, "{response}").map_err(|_| writer.error.unwrap_or(SerialError::Disconnected))
}

/// Write one line of file content verbatim, terminating it if it is not already.
pub fn send_raw_line(port: &mut dyn SerialPort, line: &str) -> Result<(), SerialError> {
    port.write_all(line.as_bytes())?;
    if !line.ends_with('\n') {
        port.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::{String, ToString};
    use std::vec::Vec;

    #[derive(Default)]
    struct Capture {
        out: Vec<u8>,
        fail: bool,
    }

    impl SerialPort for Capture {
        fn read_byte(&mut self) -> Option<u8> {
            None
        }

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
            if self.fail {
                return Err(SerialError::Timeout);
            }
            self.out.extend_from_slice(bytes);
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.out.clone()).unwrap()
        }
    }

    #[test]
    fn test_status_lines() {
        let path = FilePath::config();
        let cases: [(Response<'_>, &str); 12] = [
            (Response::PinDetectStart("GREEN_FRET"), "PINDETECT:START:GREEN_FRET"),
            (
                Response::PinDetected {
                    button: "GREEN_FRET",
                    pin: "GP10",
                },
                "PINDETECT:DETECTED:GREEN_FRET:GP10",
            ),
            (Response::Whammy(None), "WHAMMY:-1"),
            (Response::Whammy(Some(1234)), "WHAMMY:1234"),
            (Response::Joystick(Some((1, 2))), "JOYSTICK:X:1:Y:2"),
            (
                Response::Pin {
                    key: "START",
                    pressed: Some(true),
                },
                "PIN:START:1",
            ),
            (
                Response::Pin {
                    key: "nope",
                    pressed: None,
                },
                "PIN:nope:ERR",
            ),
            (Response::SetLed { index: 2, ok: false }, "SETLED:2:ERR"),
            (Response::TiltWaveEnabled(false), "TILTWAVE_ENABLE:False"),
            (Response::FileWritten(&path), "OK: File /config.json written"),
            (Response::UniqueId(&[0xE6, 0x61, 0x0a]), "E6610A"),
            (Response::UnknownCommand, "ERROR: Unknown command"),
        ];
        for (response, expected) in cases {
            assert_eq!(response.to_string(), expected);
        }
    }

    #[test]
    fn test_error_embeds_message() {
        let path = FilePath::from_wire("a.json");
        let response = Response::WriteFailed {
            path: &path,
            error: &"boom",
        };
        assert_eq!(response.to_string(), "ERROR: Failed to write /a.json: boom");
        assert_eq!(
            Response::SerialCrash(&"line too long").to_string(),
            "ERROR: Serial crash: line too long"
        );
    }

    #[test]
    fn test_send_appends_newline() {
        let mut port = Capture::default();
        send(&mut port, &Response::TiltWaveStarted).unwrap();
        send(&mut port, &Response::End).unwrap();
        assert_eq!(port.text(), "TILTWAVE:STARTED\nEND\n");
    }

    #[test]
    fn test_send_reports_port_error() {
        let mut port = Capture {
            fail: true,
            ..Capture::default()
        };
        assert_eq!(
            send(&mut port, &Response::LedRestored),
            Err(SerialError::Timeout)
        );
    }

    #[test]
    fn test_send_raw_line_terminates_once() {
        let mut port = Capture::default();
        send_raw_line(&mut port, "{\n").unwrap();
        send_raw_line(&mut port, "}").unwrap();
        assert_eq!(port.text(), "{\n}\n");
    }
}
