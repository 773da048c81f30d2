//! Button LED rendering and the tilt wave effect.

use crate::document::{DeviceConfig, UserPresets};
use crate::resources::LedStrip;
use crate::types::{GuitarButtons, LedRole, Rgb};

/// Colour of the wave head.
pub const WAVE_COLOR: Rgb = Rgb::new(0, 0, 255);

/// Colour of the LED trailing the wave head.
pub const WAVE_TRAIL_COLOR: Rgb = Rgb::new(0, 0, 48);

/// Frames of one full wave: out across the button LEDs and back.
pub const WAVE_FRAMES: usize = LedRole::ALL.len() * 2 - 1;

/// A running tilt wave, advanced one frame per [`Lighting::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TiltWave {
    frame: usize,
}

impl TiltWave {
    /// Position of the wave head within [`LedRole::ALL`] for `frame`.
    fn head(frame: usize) -> usize {
        let last = LedRole::ALL.len() - 1;
        if frame <= last {
            frame
        } else {
            2 * last - frame
        }
    }

    #[must_use]
    pub fn frame(&self) -> usize {
        self.frame
    }
}

/// LED effect state shared by the protocol engine and the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lighting {
    tilt_wave_enabled: bool,
    wave: Option<TiltWave>,
    tilt_held: bool,
}

impl Default for Lighting {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Lighting {
    #[must_use]
    pub const fn new(tilt_wave_enabled: bool) -> Self {
        Self {
            tilt_wave_enabled,
            wave: None,
            tilt_held: false,
        }
    }

    /// Seed the enable flag from the config document.
    #[must_use]
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.tilt_wave_enabled())
    }

    #[must_use]
    pub fn tilt_wave_enabled(&self) -> bool {
        self.tilt_wave_enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.tilt_wave_enabled = enabled;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.wave.is_some()
    }

    /// Start the wave from its first frame, restarting one already running.
    pub fn start_tilt_wave(&mut self) {
        self.wave = Some(TiltWave::default());
    }

    pub fn stop(&mut self) {
        self.wave = None;
    }

    /// Start a wave when the tilt sensor becomes active, if waves are enabled.
    pub fn on_buttons(&mut self, buttons: GuitarButtons) {
        let tilted = buttons.contains(GuitarButtons::TILT);
        if tilted && !self.tilt_held && self.tilt_wave_enabled {
            debug!("Tilt detected, starting wave");
            self.start_tilt_wave();
        }
        self.tilt_held = tilted;
    }

    /// Draw the current wave frame and advance it.
    ///
    /// Returns `false` once no wave is running; the caller then goes back
    /// to [`render_buttons`].
    pub fn step(&mut self, leds: &mut dyn LedStrip, config: &DeviceConfig) -> bool {
        let Some(wave) = self.wave.as_mut() else {
            return false;
        };
        if wave.frame >= WAVE_FRAMES {
            self.wave = None;
            return false;
        }

        let head = TiltWave::head(wave.frame);
        let trail = wave.frame.checked_sub(1).map(TiltWave::head);
        for (position, role) in LedRole::ALL.into_iter().enumerate() {
            let Some(index) = config.led_index(role) else {
                continue;
            };
            let color = if position == head {
                WAVE_COLOR
            } else if Some(position) == trail {
                WAVE_TRAIL_COLOR
            } else {
                Rgb::OFF
            };
            leds.set(index, color);
        }
        leds.show();

        wave.frame += 1;
        true
    }
}

/// Colour of `role`'s LED for the given button state.
///
/// Held buttons use the active preset's pressed colour, falling back to the
/// built-in palette; released buttons use the released colour or stay dark.
#[must_use]
pub fn button_color(role: LedRole, pressed: bool, presets: &UserPresets) -> Rgb {
    if pressed {
        presets
            .active_color(role.pressed_color_key())
            .unwrap_or(role.default_pressed())
    } else {
        presets
            .active_color(role.released_color_key())
            .unwrap_or(Rgb::OFF)
    }
}

/// Paint every configured button LED from the button state and latch the strip.
pub fn render_buttons(
    leds: &mut dyn LedStrip,
    buttons: GuitarButtons,
    config: &DeviceConfig,
    presets: &UserPresets,
) {
    for (role, bit) in role_bits() {
        if let Some(index) = config.led_index(role) {
            leds.set(index, button_color(role, buttons.contains(bit), presets));
        }
    }
    leds.show();
}

/// Each LED role paired with the button bit it reflects.
fn role_bits() -> impl Iterator<Item = (LedRole, GuitarButtons)> {
    LedRole::ALL.into_iter().map(|role| {
        let bit = match role {
            LedRole::GreenFret => GuitarButtons::GREEN_FRET,
            LedRole::RedFret => GuitarButtons::RED_FRET,
            LedRole::YellowFret => GuitarButtons::YELLOW_FRET,
            LedRole::BlueFret => GuitarButtons::BLUE_FRET,
            LedRole::OrangeFret => GuitarButtons::ORANGE_FRET,
            LedRole::StrumUp => GuitarButtons::STRUM_UP,
            LedRole::StrumDown => GuitarButtons::STRUM_DOWN,
        };
        (role, bit)
    })
}
