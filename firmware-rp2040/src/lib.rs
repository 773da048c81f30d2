//! USB guitar controller firmware for RP2040.
//!
//! This crate provides the hardware side of the guitar controller: the
//! adapters that let the [`guitar_core`] protocol engine drive real pins,
//! LEDs, flash and USB.
//!
//! # Overview
//!
//! The firmware runs on a Raspberry Pi Pico (RP2040) and:
//! 1. Enumerates as a composite USB device: HID gamepad plus CDC ACM serial
//! 2. Reports frets, strum, tilt and whammy as HID report ID 5
//! 3. Serves the line-oriented configuration protocol on the CDC channel
//! 4. Lights the button LEDs from the active preset
//!
//! # Hardware Configuration
//!
//! | Function   | GPIO  | Description |
//! |------------|-------|-------------|
//! | Buttons    | 0-21  | Assigned by `/config.json`, wired to ground |
//! | LED strip  | 22    | WS2812 data (PIO0, SM0) |
//! | Joystick X | 26    | ADC0 |
//! | Whammy     | 27    | ADC1 |
//! | Joystick Y | 28    | ADC2 |
//!
//! # Architecture
//!
//! - **USB executor** (interrupt priority): USB device, HID writer and the
//!   CDC pumps. Keeps enumerating and buffering while the main loop blocks.
//! - **Main task** (thread mode): polls the protocol engine, samples the
//!   buttons, renders LEDs and publishes HID reports through a
//!   [`Signal`](embassy_sync::signal::Signal) with "latest value wins"
//!   semantics.
//!
//! # Modules
//!
//! - [`usb_output`]: HID report and descriptor ([`GuitarReport`], [`UsbHidOutput`])
//! - [`usb_serial`]: CDC pumps and the engine's serial port ([`UsbSerial`])
//! - [`gpio`]: buttons and pin detection ([`PinButtons`], [`PinProbe`])
//! - [`leds`]: WS2812 strip ([`Ws2812Strip`])
//! - [`analog`]: ADC inputs ([`AdcInput`])
//! - [`storage`]: flash file slots ([`FlashStore`])
//! - [`system`]: resets and chip id ([`Rp2040System`])
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)

#![no_std]

extern crate alloc;

pub mod analog;
pub mod gpio;
pub mod leds;
pub mod storage;
pub mod system;
pub mod usb_output;
pub mod usb_serial;

pub use analog::{AdcInput, SharedAdc};
pub use gpio::{GpioBank, PinButtons, PinProbe, SharedBank, BUTTON_PIN_COUNT};
pub use leds::{Ws2812Strip, LED_COUNT};
pub use storage::FlashStore;
pub use system::Rp2040System;
pub use usb_output::{configure_usb_hid, GuitarReport, UsbHidOutput};
pub use usb_serial::{SerialChannel, UsbSerial};
