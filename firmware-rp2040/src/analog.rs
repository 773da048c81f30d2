//! Whammy and joystick axes on the RP2040 ADC.
//!
//! # Pins
//!
//! | Input      | GPIO | ADC channel |
//! |------------|------|-------------|
//! | Joystick X | 26   | 0           |
//! | Whammy     | 27   | 1           |
//! | Joystick Y | 28   | 2           |

use core::cell::RefCell;

use defmt::warn;
use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use guitar_core::AnalogInput;

/// The ADC shared by every channel on the main task.
pub type SharedAdc = Mutex<NoopRawMutex, RefCell<Adc<'static, Blocking>>>;

/// Widen a 12-bit conversion to the full 16-bit range, mapping 4095 to 65535.
#[must_use]
pub const fn scale_12_to_16(raw: u16) -> u16 {
    let raw = raw & 0x0FFF;
    (raw << 4) | (raw >> 8)
}

/// One ADC channel.
pub struct AdcInput {
    adc: &'static SharedAdc,
    channel: Option<Channel<'static>>,
}

impl AdcInput {
    #[must_use]
    pub fn new(adc: &'static SharedAdc, channel: Channel<'static>) -> Self {
        Self {
            adc,
            channel: Some(channel),
        }
    }
}

impl AnalogInput for AdcInput {
    /// Released channels and failed conversions read as 0.
    fn read(&mut self) -> u16 {
        let Some(channel) = self.channel.as_mut() else {
            return 0;
        };
        match self.adc.lock(|adc| adc.borrow_mut().blocking_read(channel)) {
            Ok(raw) => scale_12_to_16(raw),
            Err(_) => {
                warn!("ADC conversion failed");
                0
            }
        }
    }

    fn release(&mut self) {
        self.channel = None;
    }
}
