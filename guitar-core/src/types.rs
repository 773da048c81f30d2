//! Core value types: colours, LED roles, device paths and button bitfields.

use alloc::string::String;
use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use crate::resources::ButtonRegistry;

/// Path of the device configuration document.
pub const CONFIG_PATH: &str = "/config.json";

/// Path of the user preset document.
pub const USER_PRESETS_PATH: &str = "/user_presets.json";

/// Name of a hardware pin as reported by pin detection (e.g. `GP10`).
pub type PinName = heapless::String<8>;

/// An RGB colour triple as written to the LED strip.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#RRGGBB` (or bare `RRGGBB`) colour, case-insensitive.
    ///
    /// ```
    /// use guitar_core::Rgb;
    ///
    /// assert_eq!(Rgb::from_hex("#FF8000"), Some(Rgb::new(255, 128, 0)));
    /// assert_eq!(Rgb::from_hex("00ff00"), Some(Rgb::new(0, 255, 0)));
    /// assert_eq!(Rgb::from_hex("#12345"), None);
    /// ```
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s).as_bytes();
        if s.len() != 6 {
            return None;
        }
        Some(Self {
            r: hex_u8(&s[0..2])?,
            g: hex_u8(&s[2..4])?,
            b: hex_u8(&s[4..6])?,
        })
    }

    /// Build a colour from three wire channels, `None` if any is outside 0..=255.
    #[must_use]
    pub fn from_channels(r: i32, g: i32, b: i32) -> Option<Self> {
        Some(Self {
            r: u8::try_from(r).ok()?,
            g: u8::try_from(g).ok()?,
            b: u8::try_from(b).ok()?,
        })
    }
}

#[inline]
fn hex_u8(s: &[u8]) -> Option<u8> {
    Some((hex_digit(s[0])? << 4) | hex_digit(s[1])?)
}

#[inline]
fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// A button LED addressed by its role on the guitar.
///
/// Preview names come in plain, pressed/active and released forms; all
/// forms of one role address the same physical LED.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedRole {
    GreenFret,
    RedFret,
    YellowFret,
    BlueFret,
    OrangeFret,
    StrumUp,
    StrumDown,
}

impl LedRole {
    pub const ALL: [LedRole; 7] = [
        LedRole::GreenFret,
        LedRole::RedFret,
        LedRole::YellowFret,
        LedRole::BlueFret,
        LedRole::OrangeFret,
        LedRole::StrumUp,
        LedRole::StrumDown,
    ];

    /// Resolve a preview name such as `red-fret-pressed` or `strum-up-active`.
    #[must_use]
    pub fn from_preview_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|role| {
            name.eq_ignore_ascii_case(role.preview_name())
                || name.eq_ignore_ascii_case(role.pressed_color_key())
                || name.eq_ignore_ascii_case(role.released_color_key())
        })
    }

    #[must_use]
    pub const fn preview_name(self) -> &'static str {
        match self {
            LedRole::GreenFret => "green-fret",
            LedRole::RedFret => "red-fret",
            LedRole::YellowFret => "yellow-fret",
            LedRole::BlueFret => "blue-fret",
            LedRole::OrangeFret => "orange-fret",
            LedRole::StrumUp => "strum-up",
            LedRole::StrumDown => "strum-down",
        }
    }

    /// Key in the config document holding this role's LED index.
    #[must_use]
    pub const fn led_key(self) -> &'static str {
        match self {
            LedRole::GreenFret => "GREEN_FRET_led",
            LedRole::RedFret => "RED_FRET_led",
            LedRole::YellowFret => "YELLOW_FRET_led",
            LedRole::BlueFret => "BLUE_FRET_led",
            LedRole::OrangeFret => "ORANGE_FRET_led",
            LedRole::StrumUp => "STRUM_UP_led",
            LedRole::StrumDown => "STRUM_DOWN_led",
        }
    }

    /// Key of the button this LED reflects.
    #[must_use]
    pub const fn button_key(self) -> &'static str {
        match self {
            LedRole::GreenFret => "GREEN_FRET",
            LedRole::RedFret => "RED_FRET",
            LedRole::YellowFret => "YELLOW_FRET",
            LedRole::BlueFret => "BLUE_FRET",
            LedRole::OrangeFret => "ORANGE_FRET",
            LedRole::StrumUp => "STRUM_UP",
            LedRole::StrumDown => "STRUM_DOWN",
        }
    }

    /// Preset key for the colour shown while the button is held.
    #[must_use]
    pub const fn pressed_color_key(self) -> &'static str {
        match self {
            LedRole::GreenFret => "green-fret-pressed",
            LedRole::RedFret => "red-fret-pressed",
            LedRole::YellowFret => "yellow-fret-pressed",
            LedRole::BlueFret => "blue-fret-pressed",
            LedRole::OrangeFret => "orange-fret-pressed",
            LedRole::StrumUp => "strum-up-active",
            LedRole::StrumDown => "strum-down-active",
        }
    }

    /// Preset key for the colour shown while the button is released.
    #[must_use]
    pub const fn released_color_key(self) -> &'static str {
        match self {
            LedRole::GreenFret => "green-fret-released",
            LedRole::RedFret => "red-fret-released",
            LedRole::YellowFret => "yellow-fret-released",
            LedRole::BlueFret => "blue-fret-released",
            LedRole::OrangeFret => "orange-fret-released",
            LedRole::StrumUp => "strum-up-released",
            LedRole::StrumDown => "strum-down-released",
        }
    }

    /// Fallback colour when the active preset has no pressed entry.
    #[must_use]
    pub const fn default_pressed(self) -> Rgb {
        match self {
            LedRole::GreenFret => Rgb::new(0, 255, 0),
            LedRole::RedFret => Rgb::new(255, 0, 0),
            LedRole::YellowFret => Rgb::new(255, 255, 0),
            LedRole::BlueFret => Rgb::new(0, 0, 255),
            LedRole::OrangeFret => Rgb::new(255, 128, 0),
            LedRole::StrumUp | LedRole::StrumDown => Rgb::new(255, 255, 255),
        }
    }
}

/// Absolute path on the device filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePath(String);

impl FilePath {
    /// Build the device path for a name given on the wire (`config.json` -> `/config.json`).
    #[must_use]
    pub fn from_wire(name: &str) -> Self {
        let mut path = String::with_capacity(name.len() + 1);
        path.push('/');
        path.push_str(name);
        Self(path)
    }

    #[must_use]
    pub fn config() -> Self {
        Self(String::from(CONFIG_PATH))
    }

    #[must_use]
    pub fn user_presets() -> Self {
        Self(String::from(USER_PRESETS_PATH))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.0.ends_with(".json")
    }

    #[must_use]
    pub fn is_config(&self) -> bool {
        self.0 == CONFIG_PATH
    }

    #[must_use]
    pub fn is_user_presets(&self) -> bool {
        self.0 == USER_PRESETS_PATH
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interpret a bool-ish wire value; `true`, `1`, `yes` and `on` are truthy.
#[must_use]
pub fn parse_flag(s: &str) -> bool {
    let s = s.trim();
    ["true", "1", "yes", "on"]
        .iter()
        .any(|truthy| s.eq_ignore_ascii_case(truthy))
}

/// Guitar button state as a bitfield, one bit per configured button key.
///
/// # Example
///
/// ```
/// use guitar_core::GuitarButtons;
///
/// let buttons = GuitarButtons::GREEN_FRET | GuitarButtons::STRUM_DOWN;
/// assert!(buttons.contains(GuitarButtons::GREEN_FRET));
/// assert!(!buttons.contains(GuitarButtons::RED_FRET));
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GuitarButtons(pub u16);

impl GuitarButtons {
    pub const GREEN_FRET: Self = Self(1 << 0);
    pub const RED_FRET: Self = Self(1 << 1);
    pub const YELLOW_FRET: Self = Self(1 << 2);
    pub const BLUE_FRET: Self = Self(1 << 3);
    pub const ORANGE_FRET: Self = Self(1 << 4);
    pub const TILT: Self = Self(1 << 5);
    pub const SELECT: Self = Self(1 << 6);
    pub const START: Self = Self(1 << 7);
    pub const GUIDE: Self = Self(1 << 8);
    pub const DPAD_LEFT: Self = Self(1 << 9);
    pub const DPAD_RIGHT: Self = Self(1 << 10);
    pub const STRUM_UP: Self = Self(1 << 11);
    pub const STRUM_DOWN: Self = Self(1 << 12);

    pub const NONE: Self = Self(0);

    /// Config keys of every button, paired with its bit.
    pub const KEYS: [(&'static str, GuitarButtons); 13] = [
        ("GREEN_FRET", Self::GREEN_FRET),
        ("RED_FRET", Self::RED_FRET),
        ("YELLOW_FRET", Self::YELLOW_FRET),
        ("BLUE_FRET", Self::BLUE_FRET),
        ("ORANGE_FRET", Self::ORANGE_FRET),
        ("TILT", Self::TILT),
        ("SELECT", Self::SELECT),
        ("START", Self::START),
        ("GUIDE", Self::GUIDE),
        ("DPAD_LEFT", Self::DPAD_LEFT),
        ("DPAD_RIGHT", Self::DPAD_RIGHT),
        ("STRUM_UP", Self::STRUM_UP),
        ("STRUM_DOWN", Self::STRUM_DOWN),
    ];

    /// Sample every known button from the registry; unknown keys read as released.
    pub fn sample(buttons: &mut dyn ButtonRegistry) -> Self {
        let mut state = Self::NONE;
        for (key, bit) in Self::KEYS {
            if buttons.is_pressed(key) == Some(true) {
                state |= bit;
            }
        }
        state
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, button: GuitarButtons) -> bool {
        (self.0 & button.0) == button.0
    }

    #[inline]
    pub fn set(&mut self, button: GuitarButtons, pressed: bool) {
        if pressed {
            self.0 |= button.0;
        } else {
            self.0 &= !button.0;
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for GuitarButtons {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for GuitarButtons {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_from_hex() {
        assert_eq!(Rgb::from_hex("#0A0b0C"), Some(Rgb::new(10, 11, 12)));
        assert_eq!(Rgb::from_hex("ffffff"), Some(Rgb::new(255, 255, 255)));
        assert_eq!(Rgb::from_hex("#GG0000"), None);
        assert_eq!(Rgb::from_hex(""), None);
        assert_eq!(Rgb::from_hex("#FF00FF00"), None);
    }

    #[test]
    fn test_rgb_from_channels_range() {
        assert_eq!(Rgb::from_channels(0, 128, 255), Some(Rgb::new(0, 128, 255)));
        assert_eq!(Rgb::from_channels(256, 0, 0), None);
        assert_eq!(Rgb::from_channels(0, -1, 0), None);
    }

    #[test]
    fn test_preview_aliases_share_role() {
        assert_eq!(LedRole::from_preview_name("green-fret"), Some(LedRole::GreenFret));
        assert_eq!(
            LedRole::from_preview_name("Green-Fret-Pressed"),
            Some(LedRole::GreenFret)
        );
        assert_eq!(
            LedRole::from_preview_name("green-fret-released"),
            Some(LedRole::GreenFret)
        );
        assert_eq!(
            LedRole::from_preview_name("strum-down-active"),
            Some(LedRole::StrumDown)
        );
        assert_eq!(LedRole::from_preview_name("strum-down-pressed"), None);
        assert_eq!(LedRole::from_preview_name("purple-fret"), None);
    }

    #[test]
    fn test_file_path_from_wire() {
        let path = FilePath::from_wire("config.json");
        assert_eq!(path.as_str(), "/config.json");
        assert!(path.is_json());
        assert!(path.is_config());
        assert!(!FilePath::from_wire("notes.txt").is_json());
        assert!(FilePath::user_presets().is_user_presets());
    }

    #[test]
    fn test_parse_flag() {
        for truthy in ["true", "1", "yes", "on", " ON ", "True"] {
            assert!(parse_flag(truthy), "{truthy} should be truthy");
        }
        for falsy in ["false", "0", "no", "off", "", "enabled"] {
            assert!(!parse_flag(falsy), "{falsy} should be falsy");
        }
    }

    #[test]
    fn test_buttons_set_clear() {
        let mut buttons = GuitarButtons::NONE;
        buttons.set(GuitarButtons::START, true);
        assert!(buttons.contains(GuitarButtons::START));
        buttons.set(GuitarButtons::START, false);
        assert!(buttons.is_empty());
    }
}
