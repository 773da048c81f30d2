//! Button inputs and pin detection over the free GPIOs.
//!
//! # Pins
//!
//! GPIO 0 to 21 are available for buttons. GPIO 22 drives the LED strip and
//! GPIO 26 to 28 are analog inputs; neither group is ever probed.

use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt::Write;

use defmt::{debug, info};
use embassy_rp::gpio::{Flex, Pull};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{block_for, Duration, Instant};
use guitar_core::{ButtonRegistry, DeviceConfig, HardwareError, PinDetector, PinName};
use portable_atomic::{AtomicBool, Ordering};

/// Number of GPIOs buttons may be wired to, starting at GPIO 0.
pub const BUTTON_PIN_COUNT: usize = 22;

/// Interval between probe scans.
const PROBE_INTERVAL: Duration = Duration::from_millis(5);

/// Time for pull-ups to charge the lines before the first scan.
const SETTLE_TIME: Duration = Duration::from_millis(10);

/// Parse a board pin name such as `GP10` into a button GPIO number.
#[must_use]
pub fn pin_number(name: &str) -> Option<usize> {
    name.strip_prefix("GP")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&n| n < BUTTON_PIN_COUNT)
}

fn pin_name(number: usize) -> PinName {
    let mut name = PinName::new();
    // GP + two digits always fits
    let _ = write!(name, "GP{}", number);
    name
}

/// Every button-capable GPIO, reconfigurable at runtime.
pub struct GpioBank {
    pins: [Flex<'static>; BUTTON_PIN_COUNT],
}

impl GpioBank {
    /// Take ownership of the pins, leaving them floating inputs.
    pub fn new(mut pins: [Flex<'static>; BUTTON_PIN_COUNT]) -> Self {
        for pin in &mut pins {
            pin.set_as_input();
            pin.set_pull(Pull::None);
        }
        Self { pins }
    }

    fn pull_up(&mut self, number: usize) {
        let pin = &mut self.pins[number];
        pin.set_as_input();
        pin.set_pull(Pull::Up);
    }

    fn release(&mut self, number: usize) {
        self.pins[number].set_pull(Pull::None);
    }

    fn is_high(&self, number: usize) -> bool {
        self.pins[number].is_high()
    }
}

/// The bank shared by [`PinButtons`] and [`PinProbe`] on the main task.
pub type SharedBank = Mutex<NoopRawMutex, RefCell<GpioBank>>;

/// Configured buttons as pull-up inputs; pressed reads low.
pub struct PinButtons {
    bank: &'static SharedBank,
    assigned: Vec<(&'static str, usize)>,
}

impl PinButtons {
    #[must_use]
    pub fn new(bank: &'static SharedBank) -> Self {
        Self {
            bank,
            assigned: Vec::new(),
        }
    }
}

impl ButtonRegistry for PinButtons {
    fn read(&mut self, key: &str) -> Option<bool> {
        let number = self
            .assigned
            .iter()
            .find(|(assigned, _)| *assigned == key)
            .map(|&(_, number)| number)?;
        Some(self.bank.lock(|bank| bank.borrow().is_high(number)))
    }

    fn release_all(&mut self) {
        let assigned = &mut self.assigned;
        self.bank.lock(|bank| {
            let mut bank = bank.borrow_mut();
            for &(_, number) in assigned.iter() {
                bank.release(number);
            }
        });
        assigned.clear();
    }

    fn reinit(&mut self, config: &DeviceConfig) -> Result<(), HardwareError> {
        self.release_all();
        let (assigned, outcome) = config.assign_buttons(pin_number);
        self.bank.lock(|bank| {
            let mut bank = bank.borrow_mut();
            for &(_, number) in &assigned {
                bank.pull_up(number);
            }
        });
        self.assigned = assigned;
        debug!("{} buttons configured", self.assigned.len());
        outcome
    }
}

/// Finds the GPIO a button is wired to by waiting for a line to go low.
///
/// Runs with every button released. Lines already low when probing starts
/// are ignored.
pub struct PinProbe {
    bank: &'static SharedBank,
    cancel: &'static AtomicBool,
}

impl PinProbe {
    /// `cancel` is raised asynchronously, typically by the serial receive pump.
    #[must_use]
    pub fn new(bank: &'static SharedBank, cancel: &'static AtomicBool) -> Self {
        Self { bank, cancel }
    }

    fn scan(&self, baseline: u32) -> Option<usize> {
        self.bank.lock(|bank| {
            let bank = bank.borrow();
            (0..BUTTON_PIN_COUNT).find(|&n| baseline & (1 << n) == 0 && !bank.is_high(n))
        })
    }
}

impl PinDetector for PinProbe {
    fn detect(&mut self, button: &str, timeout_secs: u32) -> Option<PinName> {
        info!("Detecting pin for {} ({}s)", button, timeout_secs);
        self.bank.lock(|bank| {
            let mut bank = bank.borrow_mut();
            for n in 0..BUTTON_PIN_COUNT {
                bank.pull_up(n);
            }
        });
        block_for(SETTLE_TIME);

        let baseline = self.bank.lock(|bank| {
            let bank = bank.borrow();
            (0..BUTTON_PIN_COUNT)
                .filter(|&n| !bank.is_high(n))
                .fold(0u32, |mask, n| mask | (1 << n))
        });

        let deadline = Instant::now() + Duration::from_secs(u64::from(timeout_secs));
        let found = loop {
            if self.cancel.swap(false, Ordering::AcqRel) {
                info!("Pin detection cancelled");
                break None;
            }
            if let Some(number) = self.scan(baseline) {
                break Some(number);
            }
            if Instant::now() >= deadline {
                break None;
            }
            block_for(PROBE_INTERVAL);
        };

        self.bank.lock(|bank| {
            let mut bank = bank.borrow_mut();
            for n in 0..BUTTON_PIN_COUNT {
                bank.release(n);
            }
        });

        found.map(pin_name)
    }

    /// Detection runs to completion before the engine sees the cancel line,
    /// so this only clears a request that arrived with nothing to cancel.
    fn cancel(&mut self) {
        self.cancel.store(false, Ordering::Release);
    }
}
