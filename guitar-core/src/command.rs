//! Single-line command parsing.
//!
//! Every line received while no payload session is active is parsed into a
//! [`Command`] in one step. Matching is case-sensitive: commands with
//! arguments match on their literal `TAG:` prefix, commands without
//! arguments must match the whole line.
//!
//! ```text
//! SETLED:<index>:<r>:<g>:<b>
//! PREVIEWLED:<role>:<#RRGGBB>
//! WRITEFILE:<name>
//! ```

use core::fmt;

use crate::types::{parse_flag, FilePath, LedRole, Rgb};

pub const PREVIEW_LED_PREFIX: &str = "PREVIEWLED:";

/// Line that aborts a running pin detection.
pub const CANCEL_PIN_DETECT: &str = "CANCELPINDETECT";

/// A parsed command with validated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `DETECTPIN:<button>`
    DetectPin { button: &'a str },
    /// `SAVEPIN:<button>:<pin>`
    SavePin { button: &'a str, pin: &'a str },
    /// `CANCELPINDETECT`
    CancelPinDetect,
    /// `PREVIEWLED:<role>:<hex>`
    PreviewLed { role: LedRole, color: Rgb },
    /// `READFILE:<name>`
    ReadFile { path: FilePath },
    /// `READWHAMMY`
    ReadWhammy,
    /// `READJOYSTICK`
    ReadJoystick,
    /// `WRITEFILE:<name>`
    WriteFile { path: FilePath },
    /// `IMPORTUSER`
    ImportUser,
    /// `READPIN:<key>`
    ReadPin { key: &'a str },
    /// `TILTWAVE`
    TiltWave,
    /// `SETLED:<index>:<r>:<g>:<b>`; `color` is `None` when a channel is out of range.
    SetLed { index: i32, color: Option<Rgb> },
    /// `LEDRESTORE`
    LedRestore,
    /// `TILTWAVE_ENABLE:<flag>`
    TiltWaveEnable(bool),
    /// `REBOOTBOOTSEL`
    RebootBootsel,
    /// `REBOOT`
    Reboot,
    /// `READUID`
    ReadUid,
}

/// Why a line could not be turned into a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// No command matches the line.
    Unknown,
    /// `SAVEPIN` without exactly a button and a pin.
    SavePinFormat,
    /// `SETLED` without exactly four fields.
    SetLedFormat,
    /// `SETLED` field that is not an integer.
    SetLedNumber,
    /// `PREVIEWLED` without exactly a role and a colour.
    PreviewFormat,
    /// `PREVIEWLED` role name with no LED.
    PreviewRole,
    /// `PREVIEWLED` colour that is not `#RRGGBB`.
    PreviewColor,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandError::Unknown => "Unknown command",
            CommandError::SavePinFormat => "Invalid SAVEPIN format",
            CommandError::SetLedFormat => "Invalid SETLED format",
            CommandError::SetLedNumber => "invalid literal for integer",
            CommandError::PreviewFormat => "Invalid PREVIEWLED format",
            CommandError::PreviewRole => "LED not found",
            CommandError::PreviewColor => "invalid hex colour",
        })
    }
}

impl<'a> Command<'a> {
    /// Parse one line (without its terminator).
    pub fn parse(line: &'a str) -> Result<Self, CommandError> {
        if let Some(button) = line.strip_prefix("DETECTPIN:") {
            return Ok(Command::DetectPin {
                button: button.trim(),
            });
        }
        if line.starts_with("SAVEPIN:") {
            return parse_save_pin(line);
        }
        if line.starts_with(PREVIEW_LED_PREFIX) {
            return parse_preview_led(line);
        }
        if let Some(name) = line.strip_prefix("READFILE:") {
            return Ok(Command::ReadFile {
                path: FilePath::from_wire(name),
            });
        }
        if let Some(name) = line.strip_prefix("WRITEFILE:") {
            return Ok(Command::WriteFile {
                path: FilePath::from_wire(name),
            });
        }
        if let Some(key) = line.strip_prefix("READPIN:") {
            return Ok(Command::ReadPin { key: key.trim() });
        }
        if line.starts_with("SETLED:") {
            return parse_set_led(line);
        }
        if let Some(flag) = line.strip_prefix("TILTWAVE_ENABLE:") {
            return Ok(Command::TiltWaveEnable(parse_flag(flag)));
        }

        match line {
            CANCEL_PIN_DETECT => Ok(Command::CancelPinDetect),
            "READWHAMMY" => Ok(Command::ReadWhammy),
            "READJOYSTICK" => Ok(Command::ReadJoystick),
            "IMPORTUSER" => Ok(Command::ImportUser),
            "TILTWAVE" => Ok(Command::TiltWave),
            "LEDRESTORE" => Ok(Command::LedRestore),
            "REBOOTBOOTSEL" => Ok(Command::RebootBootsel),
            "REBOOT" => Ok(Command::Reboot),
            "READUID" => Ok(Command::ReadUid),
            _ => Err(CommandError::Unknown),
        }
    }
}

/// Whether `line` is a live LED preview, which is accepted in every session state.
#[must_use]
pub fn is_preview(line: &str) -> bool {
    line.starts_with(PREVIEW_LED_PREFIX)
}

fn parse_save_pin(line: &str) -> Result<Command<'_>, CommandError> {
    let mut parts = line.split(':').skip(1);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(button), Some(pin), None) => Ok(Command::SavePin { button, pin }),
        _ => Err(CommandError::SavePinFormat),
    }
}

fn parse_preview_led(line: &str) -> Result<Command<'_>, CommandError> {
    let mut parts = line.split(':').skip(1);
    let (name, hex) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(hex), None) => (name, hex),
        _ => return Err(CommandError::PreviewFormat),
    };
    let role = LedRole::from_preview_name(name).ok_or(CommandError::PreviewRole)?;
    let color = Rgb::from_hex(hex).ok_or(CommandError::PreviewColor)?;
    Ok(Command::PreviewLed { role, color })
}

fn parse_set_led(line: &str) -> Result<Command<'_>, CommandError> {
    let mut fields = [0i32; 4];
    let mut parts = line.split(':').skip(1);
    for field in fields.iter_mut() {
        let part = parts.next().ok_or(CommandError::SetLedFormat)?;
        *field = part
            .trim()
            .parse()
            .map_err(|_| CommandError::SetLedNumber)?;
    }
    if parts.next().is_some() {
        return Err(CommandError::SetLedFormat);
    }

    let [index, r, g, b] = fields;
    Ok(Command::SetLed {
        index,
        color: Rgb::from_channels(r, g, b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_argumentless_commands() {
        assert_eq!(Command::parse("READWHAMMY"), Ok(Command::ReadWhammy));
        assert_eq!(Command::parse("READJOYSTICK"), Ok(Command::ReadJoystick));
        assert_eq!(Command::parse("IMPORTUSER"), Ok(Command::ImportUser));
        assert_eq!(Command::parse("TILTWAVE"), Ok(Command::TiltWave));
        assert_eq!(Command::parse("LEDRESTORE"), Ok(Command::LedRestore));
        assert_eq!(Command::parse("REBOOT"), Ok(Command::Reboot));
        assert_eq!(Command::parse("REBOOTBOOTSEL"), Ok(Command::RebootBootsel));
        assert_eq!(Command::parse("READUID"), Ok(Command::ReadUid));
        assert_eq!(
            Command::parse("CANCELPINDETECT"),
            Ok(Command::CancelPinDetect)
        );
    }

    #[test]
    fn test_matching_is_case_sensitive_and_exact() {
        assert_eq!(Command::parse("reboot"), Err(CommandError::Unknown));
        assert_eq!(Command::parse("REBOOT "), Err(CommandError::Unknown));
        assert_eq!(Command::parse("READWHAMMYX"), Err(CommandError::Unknown));
        assert_eq!(Command::parse(""), Err(CommandError::Unknown));
    }

    #[test]
    fn test_parse_pin_commands() {
        assert_eq!(
            Command::parse("DETECTPIN: GREEN_FRET "),
            Ok(Command::DetectPin {
                button: "GREEN_FRET"
            })
        );
        assert_eq!(
            Command::parse("SAVEPIN:RED_FRET:GP11"),
            Ok(Command::SavePin {
                button: "RED_FRET",
                pin: "GP11"
            })
        );
        assert_eq!(
            Command::parse("SAVEPIN:RED_FRET"),
            Err(CommandError::SavePinFormat)
        );
        assert_eq!(
            Command::parse("SAVEPIN:RED_FRET:GP11:x"),
            Err(CommandError::SavePinFormat)
        );
        assert_eq!(
            Command::parse("READPIN:START "),
            Ok(Command::ReadPin { key: "START" })
        );
    }

    #[test]
    fn test_parse_file_commands() {
        assert_eq!(
            Command::parse("READFILE:config.json"),
            Ok(Command::ReadFile {
                path: FilePath::config()
            })
        );
        assert_eq!(
            Command::parse("WRITEFILE:user_presets.json"),
            Ok(Command::WriteFile {
                path: FilePath::user_presets()
            })
        );
    }

    #[test]
    fn test_parse_set_led() {
        assert_eq!(
            Command::parse("SETLED:0:10:20:30"),
            Ok(Command::SetLed {
                index: 0,
                color: Some(Rgb::new(10, 20, 30))
            })
        );
        assert_eq!(
            Command::parse("SETLED:2:300:0:0"),
            Ok(Command::SetLed {
                index: 2,
                color: None
            })
        );
        assert_eq!(
            Command::parse("SETLED:-1:0:0:0"),
            Ok(Command::SetLed {
                index: -1,
                color: Some(Rgb::OFF)
            })
        );
        assert_eq!(
            Command::parse("SETLED:1:2:3"),
            Err(CommandError::SetLedFormat)
        );
        assert_eq!(
            Command::parse("SETLED:1:2:3:4:5"),
            Err(CommandError::SetLedFormat)
        );
        assert_eq!(
            Command::parse("SETLED:a:2:3:4"),
            Err(CommandError::SetLedNumber)
        );
    }

    #[test]
    fn test_parse_preview_led() {
        assert_eq!(
            Command::parse("PREVIEWLED:blue-fret-pressed:#0000FF"),
            Ok(Command::PreviewLed {
                role: LedRole::BlueFret,
                color: Rgb::new(0, 0, 255)
            })
        );
        assert_eq!(
            Command::parse("PREVIEWLED:whammy:#0000FF"),
            Err(CommandError::PreviewRole)
        );
        assert_eq!(
            Command::parse("PREVIEWLED:blue-fret:blue"),
            Err(CommandError::PreviewColor)
        );
        assert_eq!(
            Command::parse("PREVIEWLED:blue-fret"),
            Err(CommandError::PreviewFormat)
        );
        assert!(is_preview("PREVIEWLED:anything"));
        assert!(!is_preview("previewled:x:y"));
    }

    #[test]
    fn test_tiltwave_enable_is_not_tiltwave() {
        assert_eq!(
            Command::parse("TILTWAVE_ENABLE:on"),
            Ok(Command::TiltWaveEnable(true))
        );
        assert_eq!(
            Command::parse("TILTWAVE_ENABLE:nope"),
            Ok(Command::TiltWaveEnable(false))
        );
    }
}
