//! WS2812 button LEDs driven by PIO0.

use defmt::warn;
use embassy_futures::block_on;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio_programs::ws2812::PioWs2812;
use guitar_core::{LedStrip, Rgb};
use smart_leds::RGB8;

/// Pixels on the strip, one per button LED.
pub const LED_COUNT: usize = 7;

/// Buffered [`LedStrip`] over the PIO WS2812 driver.
pub struct Ws2812Strip {
    driver: Option<PioWs2812<'static, PIO0, 0, LED_COUNT>>,
    pixels: [RGB8; LED_COUNT],
}

impl Ws2812Strip {
    #[must_use]
    pub fn new(driver: PioWs2812<'static, PIO0, 0, LED_COUNT>) -> Self {
        Self {
            driver: Some(driver),
            pixels: [RGB8::default(); LED_COUNT],
        }
    }
}

impl LedStrip for Ws2812Strip {
    fn len(&self) -> usize {
        LED_COUNT
    }

    fn set(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = RGB8::new(color.r, color.g, color.b);
        }
    }

    fn get(&self, index: usize) -> Option<Rgb> {
        self.pixels.get(index).map(|p| Rgb::new(p.r, p.g, p.b))
    }

    fn show(&mut self) {
        match self.driver.as_mut() {
            // A frame is a few hundred microseconds of DMA
            Some(driver) => block_on(driver.write(&self.pixels)),
            None => warn!("LED strip released, frame dropped"),
        }
    }

    /// Blank the strip and free the state machine.
    fn release(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            self.pixels = [RGB8::default(); LED_COUNT];
            block_on(driver.write(&self.pixels));
        }
    }
}
