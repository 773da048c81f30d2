//! USB CDC ACM data channel to the configuration tool.
//!
//! Two pump tasks move bytes between the CDC endpoints and a pair of
//! [`Pipe`]s. The pumps run on the interrupt executor together with the
//! USB stack, so the host keeps being served while the main loop is busy
//! in a blocking command. [`UsbSerial`] is the main loop's view of the
//! channel and never awaits.

use defmt::{debug, info, warn};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::{Pipe, TryWriteError};
use embassy_time::{Duration, Instant};
use embassy_usb::class::cdc_acm::{Receiver, Sender};
use embassy_usb::driver::EndpointError;
use guitar_core::{LineWatch, SerialError, SerialPort, CANCEL_PIN_DETECT};
use portable_atomic::{AtomicBool, Ordering};

/// CDC bulk endpoint packet size.
pub const MAX_PACKET_SIZE: u16 = 64;

/// Bytes buffered from the host ahead of the engine.
pub const RX_CAPACITY: usize = 512;

/// Bytes buffered towards the host.
pub const TX_CAPACITY: usize = 1024;

/// How long a write may wait for room in the transmit pipe.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared state between the CDC pumps and [`UsbSerial`].
pub struct SerialChannel {
    rx: Pipe<CriticalSectionRawMutex, RX_CAPACITY>,
    tx: Pipe<CriticalSectionRawMutex, TX_CAPACITY>,
    connected: AtomicBool,
    cancel_requested: AtomicBool,
}

impl Default for SerialChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialChannel {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: Pipe::new(),
            tx: Pipe::new(),
            connected: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Set by the receive pump when a cancel line arrives, ahead of the engine seeing it.
    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel_requested
    }

    /// Whether the transmit pipe has drained to the USB stack.
    #[must_use]
    pub fn tx_is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Move host bytes into the receive pipe, watching for pin detection cancels.
pub async fn run_receiver(
    mut receiver: Receiver<'static, Driver<'static, USB>>,
    channel: &'static SerialChannel,
) -> ! {
    let mut buf = [0u8; MAX_PACKET_SIZE as usize];
    let mut cancel = LineWatch::new(CANCEL_PIN_DETECT);
    loop {
        receiver.wait_connection().await;
        info!("Serial host connected");
        loop {
            match receiver.read_packet(&mut buf).await {
                Ok(n) => {
                    let data = &buf[..n];
                    if cancel.feed(data) {
                        debug!("Cancel request spotted");
                        channel.cancel_requested.store(true, Ordering::Release);
                    }
                    channel.rx.write_all(data).await;
                }
                Err(EndpointError::Disabled) => break,
                Err(EndpointError::BufferOverflow) => warn!("Serial packet overflow"),
            }
        }
        info!("Serial host disconnected");
    }
}

/// Drain the transmit pipe into the CDC IN endpoint.
pub async fn run_sender(
    mut sender: Sender<'static, Driver<'static, USB>>,
    channel: &'static SerialChannel,
) -> ! {
    let mut buf = [0u8; MAX_PACKET_SIZE as usize];
    loop {
        sender.wait_connection().await;
        channel.connected.store(true, Ordering::Release);
        loop {
            let n = channel.tx.read(&mut buf).await;
            if sender.write_packet(&buf[..n]).await.is_err() {
                break;
            }
            // A full packet does not end a transfer; close it once idle
            if n == buf.len() && channel.tx.is_empty() && sender.write_packet(&[]).await.is_err()
            {
                break;
            }
        }
        channel.connected.store(false, Ordering::Release);
        channel.tx.clear();
    }
}

/// Non-blocking [`SerialPort`] over the CDC pipes.
pub struct UsbSerial {
    channel: &'static SerialChannel,
}

impl UsbSerial {
    #[must_use]
    pub fn new(channel: &'static SerialChannel) -> Self {
        Self { channel }
    }
}

impl SerialPort for UsbSerial {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.channel.rx.try_read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), SerialError> {
        if !self.channel.connected.load(Ordering::Acquire) {
            return Err(SerialError::Disconnected);
        }
        let deadline = Instant::now() + WRITE_TIMEOUT;
        while !bytes.is_empty() {
            match self.channel.tx.try_write(bytes) {
                Ok(n) => bytes = &bytes[n..],
                Err(TryWriteError::Full) => {
                    if !self.channel.connected.load(Ordering::Acquire) {
                        return Err(SerialError::Disconnected);
                    }
                    if Instant::now() >= deadline {
                        return Err(SerialError::Timeout);
                    }
                }
            }
        }
        Ok(())
    }
}
