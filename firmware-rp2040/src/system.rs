//! Resets and chip identity.

use cortex_m::peripheral::SCB;
use defmt::info;
use embassy_time::{block_for, Duration, Instant};
use guitar_core::{HardwareError, SystemControl};

use crate::usb_serial::SerialChannel;

/// Longest wait for queued replies to leave before a reset.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(250);

/// Time for the last USB packet to be collected by the host.
const FLUSH_GRACE: Duration = Duration::from_millis(20);

/// [`SystemControl`] for the RP2040.
pub struct Rp2040System {
    channel: &'static SerialChannel,
    uid: Option<[u8; 8]>,
}

impl Rp2040System {
    /// `uid` is the flash id read at boot, `None` if that read failed.
    #[must_use]
    pub fn new(channel: &'static SerialChannel, uid: Option<[u8; 8]>) -> Self {
        Self { channel, uid }
    }

    /// Give the acknowledgement already queued a chance to reach the host.
    fn flush(&self) {
        let deadline = Instant::now() + FLUSH_TIMEOUT;
        while !self.channel.tx_is_empty() && Instant::now() < deadline {}
        block_for(FLUSH_GRACE);
    }
}

impl SystemControl for Rp2040System {
    fn reset(&mut self) -> Result<(), HardwareError> {
        info!("Resetting");
        self.flush();
        SCB::sys_reset()
    }

    fn reset_to_bootloader(&mut self) -> Result<(), HardwareError> {
        info!("Resetting to BOOTSEL");
        self.flush();
        embassy_rp::rom_data::reset_to_usb_boot(0, 0);
        // The ROM call only returns if the bootrom rejected it
        Err(HardwareError::Unsupported)
    }

    fn unique_id(&mut self) -> Result<&[u8], HardwareError> {
        self.uid
            .as_ref()
            .map(|uid| uid.as_slice())
            .ok_or(HardwareError::Unsupported)
    }
}
