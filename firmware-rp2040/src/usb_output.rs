//! USB HID guitar output implementation.

use defmt::Format;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::class::hid::{HidWriter, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::Builder;
use guitar_core::GuitarButtons;

/// HID report ID of the guitar input report.
pub const REPORT_ID: u8 = 5;

/// Hat value reported while neither strum direction is held (outside 0..=7).
pub const HAT_CENTERED: u8 = 8;

/// USB HID guitar report.
///
/// Matches [`REPORT_DESCRIPTOR`]. Total size: 5 bytes including the report ID
/// (buttons: 11 bits + 5 padding, hat: 4 bits + 4 padding, whammy: 1 byte).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Format)]
pub struct GuitarReport {
    /// Button bitfield, one bit per non-strum button
    pub buttons: u16,
    /// Hat switch direction (0 = up, 4 = down, 8 = centred)
    pub hat: u8,
    /// Whammy bar (0-255)
    pub whammy: u8,
}

impl Default for GuitarReport {
    fn default() -> Self {
        Self::neutral()
    }
}

impl GuitarReport {
    /// Size of the report in bytes, report ID included.
    pub const SIZE: usize = 5;

    /// Buttons carried in the button field; strum is reported on the hat.
    const BUTTON_MASK: u16 = (1 << 11) - 1;

    /// Build a report from sampled buttons and a 16-bit whammy reading.
    #[must_use]
    pub fn new(buttons: GuitarButtons, whammy: u16) -> Self {
        let hat = if buttons.contains(GuitarButtons::STRUM_UP) {
            0
        } else if buttons.contains(GuitarButtons::STRUM_DOWN) {
            4
        } else {
            HAT_CENTERED
        };
        Self {
            buttons: buttons.raw() & Self::BUTTON_MASK,
            hat,
            whammy: (whammy >> 8) as u8,
        }
    }

    /// Convert the report to bytes.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        let buttons_bytes = self.buttons.to_le_bytes();
        [
            REPORT_ID,
            buttons_bytes[0],
            buttons_bytes[1],
            self.hat & 0x0F,
            self.whammy,
        ]
    }

    /// Neutral/zero report.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            buttons: 0,
            hat: HAT_CENTERED,
            whammy: 0,
        }
    }
}

/// Guitar HID Report Descriptor.
///
/// This descriptor defines a gamepad with:
/// - 11 buttons
/// - a hat switch driven by the strum bar
/// - the whammy bar as an unsigned 8-bit Z axis
pub const REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Gamepad)
    0xA1, 0x01, // Collection (Application)
    0x85, REPORT_ID, //   Report ID (5)
    //
    // --- Buttons (11 buttons) ---
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (Button 1)
    0x29, 0x0B, //   Usage Maximum (Button 11)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x95, 0x0B, //   Report Count (11)
    0x75, 0x01, //   Report Size (1)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x95, 0x05, //   Report Count (5)
    0x81, 0x03, //   Input (Constant) - padding
    //
    // --- Hat switch ---
    0x05, 0x01, //   Usage Page (Generic Desktop)
    0x09, 0x39, //   Usage (Hat Switch)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x07, //   Logical Maximum (7)
    0x35, 0x00, //   Physical Minimum (0)
    0x46, 0x3B, 0x01, //   Physical Maximum (315)
    0x65, 0x14, //   Unit (Degrees)
    0x75, 0x04, //   Report Size (4)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x42, //   Input (Data, Variable, Absolute, Null State)
    0x65, 0x00, //   Unit (None)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x03, //   Input (Constant) - padding
    //
    // --- Whammy ---
    0x09, 0x32, //   Usage (Z)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, //   Logical Maximum (255)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    0xC0, // End Collection
];

/// USB HID guitar output.
///
/// Wraps an embassy-usb HID writer to send guitar reports.
pub struct UsbHidOutput<'d> {
    writer: HidWriter<'d, Driver<'d, USB>, 8>,
    last: Option<GuitarReport>,
}

impl<'d> UsbHidOutput<'d> {
    /// Create a new USB HID output from the given HID writer.
    pub fn new(writer: HidWriter<'d, Driver<'d, USB>, 8>) -> Self {
        Self { writer, last: None }
    }

    /// Wait until the device is ready (USB enumerated).
    pub async fn wait_ready(&mut self) {
        self.writer.ready().await;
    }

    /// Send `report` unless it equals the last one delivered.
    pub async fn send(&mut self, report: GuitarReport) -> Result<(), EndpointError> {
        if self.last == Some(report) {
            return Ok(());
        }
        self.writer.write(&report.as_bytes()).await?;
        self.last = Some(report);
        Ok(())
    }

    /// Forget the last report so the next one is always sent.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

/// Configure the USB HID class in the USB builder.
///
/// Returns the HID writer for use by the application.
pub fn configure_usb_hid<'d>(
    builder: &mut Builder<'d, Driver<'d, USB>>,
    state: &'d mut State<'d>,
) -> HidWriter<'d, Driver<'d, USB>, 8> {
    let config = embassy_usb::class::hid::Config {
        report_descriptor: REPORT_DESCRIPTOR,
        request_handler: None,
        poll_ms: 1,
        max_packet_size: 8,
        hid_subclass: embassy_usb::class::hid::HidSubclass::No,
        hid_boot_protocol: embassy_usb::class::hid::HidBootProtocol::None,
    };

    HidWriter::new(builder, state, config)
}
