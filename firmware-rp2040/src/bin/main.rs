#![no_std]
#![no_main]

use core::cell::RefCell;
use core::fmt::Write;

use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::adc::{Adc, Channel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::flash::Flash;
use embassy_rp::gpio::{Flex, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::{PIO0, USB};
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::pio_programs::ws2812::{PioWs2812, PioWs2812Program};
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender, State as CdcState};
use embassy_usb::class::hid::State as HidState;
use embassy_usb::{Builder, Config as UsbConfig, UsbDevice};
use embedded_alloc::LlffHeap as Heap;
use guitar_core::{
    render_buttons, AnalogInput, ButtonRegistry, DeviceConfig, Engine, GuitarButtons, Joystick,
    LedStrip, Lighting, Peripherals, UserPresets,
};
use guitar_firmware_rp2040::gpio::BUTTON_PIN_COUNT;
use guitar_firmware_rp2040::storage::BoardFlash;
use guitar_firmware_rp2040::usb_serial::{self, MAX_PACKET_SIZE};
use guitar_firmware_rp2040::{
    configure_usb_hid, AdcInput, FlashStore, GpioBank, GuitarReport, PinButtons, PinProbe,
    Rp2040System, SerialChannel, SharedAdc, SharedBank, UsbHidOutput, UsbSerial, Ws2812Strip,
    LED_COUNT,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

#[global_allocator]
static HEAP: Heap = Heap::empty();

/// Heap for the JSON documents; the largest file is a flash slot.
const HEAP_SIZE: usize = 64 * 1024;

const USB_VID: u16 = 0x6997;

/// Product id used when the flash id cannot be read.
const FALLBACK_PID: u16 = 0x0001;

/// Main loop period.
const LOOP_PERIOD: Duration = Duration::from_millis(1);

/// Time each tilt wave frame stays lit.
const WAVE_FRAME_PERIOD: Duration = Duration::from_millis(40);

/// USB stack, HID writer and CDC pumps run here, above the main loop.
static EXECUTOR_USB: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_USB.on_interrupt()
}

static SERIAL_CHANNEL: SerialChannel = SerialChannel::new();

/// Signal for passing HID reports from the main loop to the HID task.
/// "Latest value wins": only the most recent button state matters.
static REPORT_SIGNAL: StaticCell<Signal<CriticalSectionRawMutex, GuitarReport>> =
    StaticCell::new();

/// USB device configuration buffer.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

static HID_STATE: StaticCell<HidState> = StaticCell::new();
static CDC_STATE: StaticCell<CdcState> = StaticCell::new();
static SERIAL_NUMBER: StaticCell<heapless::String<16>> = StaticCell::new();

static GPIO_BANK: StaticCell<SharedBank> = StaticCell::new();
static ADC: StaticCell<SharedAdc> = StaticCell::new();

/// Every resource the protocol engine drives, owned by the main task.
struct Device {
    serial: UsbSerial,
    strip: Ws2812Strip,
    buttons: PinButtons,
    whammy: AdcInput,
    joystick_x: AdcInput,
    joystick_y: AdcInput,
    files: FlashStore,
    probe: PinProbe,
    system: Rp2040System,
    config: DeviceConfig,
    presets: UserPresets,
    lighting: Lighting,
}

impl Device {
    fn peripherals(&mut self) -> Peripherals<'_> {
        Peripherals {
            serial: &mut self.serial,
            leds: Some(&mut self.strip as &mut dyn LedStrip),
            buttons: &mut self.buttons,
            whammy: Some(&mut self.whammy as &mut dyn AnalogInput),
            joystick: Some(Joystick {
                x: &mut self.joystick_x,
                y: &mut self.joystick_y,
            }),
            files: &mut self.files,
            pin_detector: &mut self.probe,
            system: &mut self.system,
            config: &mut self.config,
            presets: &mut self.presets,
            lighting: &mut self.lighting,
        }
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Guitar controller starting...");

    {
        use core::mem::MaybeUninit;
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
    }

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- Storage and persisted documents ---
    let flash: BoardFlash = Flash::new_blocking(p.FLASH);
    let mut files = FlashStore::new(flash);
    let uid = match files.unique_id() {
        Ok(uid) => Some(uid),
        Err(e) => {
            error!("Flash id unavailable: {:?}", e);
            None
        }
    };
    let config = DeviceConfig::load(&mut files);
    let presets = UserPresets::load(&mut files);
    let lighting = Lighting::from_config(&config);

    // --- Buttons ---
    let pins: [Flex<'static>; BUTTON_PIN_COUNT] = [
        Flex::new(p.PIN_0),
        Flex::new(p.PIN_1),
        Flex::new(p.PIN_2),
        Flex::new(p.PIN_3),
        Flex::new(p.PIN_4),
        Flex::new(p.PIN_5),
        Flex::new(p.PIN_6),
        Flex::new(p.PIN_7),
        Flex::new(p.PIN_8),
        Flex::new(p.PIN_9),
        Flex::new(p.PIN_10),
        Flex::new(p.PIN_11),
        Flex::new(p.PIN_12),
        Flex::new(p.PIN_13),
        Flex::new(p.PIN_14),
        Flex::new(p.PIN_15),
        Flex::new(p.PIN_16),
        Flex::new(p.PIN_17),
        Flex::new(p.PIN_18),
        Flex::new(p.PIN_19),
        Flex::new(p.PIN_20),
        Flex::new(p.PIN_21),
    ];
    let bank: &'static SharedBank =
        GPIO_BANK.init(Mutex::new(RefCell::new(GpioBank::new(pins))));
    let mut buttons = PinButtons::new(bank);
    if let Err(e) = buttons.reinit(&config) {
        warn!("Some buttons left unassigned: {:?}", e);
    }
    let probe = PinProbe::new(bank, SERIAL_CHANNEL.cancel_flag());

    // --- Analog inputs ---
    let adc: &'static SharedAdc = ADC.init(Mutex::new(RefCell::new(Adc::new_blocking(
        p.ADC,
        AdcConfig::default(),
    ))));
    let joystick_x = AdcInput::new(adc, Channel::new_pin(p.PIN_26, Pull::None));
    let whammy = AdcInput::new(adc, Channel::new_pin(p.PIN_27, Pull::None));
    let joystick_y = AdcInput::new(adc, Channel::new_pin(p.PIN_28, Pull::None));

    // --- LED strip ---
    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);
    let program = PioWs2812Program::new(&mut common);
    let ws2812: PioWs2812<'static, PIO0, 0, LED_COUNT> =
        PioWs2812::new(&mut common, sm0, p.DMA_CH0, p.PIN_22, &program);
    let strip = Ws2812Strip::new(ws2812);

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let pid = uid.map_or(FALLBACK_PID, |uid| u16::from_be_bytes([uid[6], uid[7]]));
    let serial_number = SERIAL_NUMBER.init(heapless::String::new());
    for byte in uid.unwrap_or_default() {
        // 8 bytes as 16 hex digits fill the string exactly
        let _ = write!(serial_number, "{:02X}", byte);
    }

    let mut usb_config = UsbConfig::new(USB_VID, pid);
    usb_config.manufacturer = Some("BumbleGum");
    usb_config.product = Some("CH-Guitar");
    usb_config.serial_number = Some(serial_number.as_str());
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let config_descriptor = CONFIG_DESCRIPTOR.init([0; 256]);
    let bos_descriptor = BOS_DESCRIPTOR.init([0; 256]);
    let msos_descriptor = MSOS_DESCRIPTOR.init([0; 256]);
    let control_buf = CONTROL_BUF.init([0; 64]);

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );

    // HID gamepad first, then the CDC data channel
    let hid_state = HID_STATE.init(HidState::new());
    let hid_writer = configure_usb_hid(&mut builder, hid_state);
    let cdc = CdcAcmClass::new(&mut builder, CDC_STATE.init(CdcState::new()), MAX_PACKET_SIZE);
    let (cdc_sender, cdc_receiver) = cdc.split();

    let usb_device = builder.build();
    let hid_output = UsbHidOutput::new(hid_writer);
    let reports = REPORT_SIGNAL.init(Signal::new());

    // Spawn USB tasks on the high priority executor (unwrap the SpawnToken, then spawn)
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let usb_spawner = EXECUTOR_USB.start(interrupt::SWI_IRQ_1);
    usb_spawner.spawn(usb_task(usb_device).unwrap());
    usb_spawner.spawn(hid_task(hid_output, reports).unwrap());
    usb_spawner.spawn(serial_rx_task(cdc_receiver, &SERIAL_CHANNEL).unwrap());
    usb_spawner.spawn(serial_tx_task(cdc_sender, &SERIAL_CHANNEL).unwrap());

    let mut device = Device {
        serial: UsbSerial::new(&SERIAL_CHANNEL),
        strip,
        buttons,
        whammy,
        joystick_x,
        joystick_y,
        files,
        probe,
        system: Rp2040System::new(&SERIAL_CHANNEL, uid),
        config,
        presets,
        lighting,
    };

    info!("Guitar controller initialized");
    run(&mut device, reports).await;
}

/// Main loop: serve the protocol, report buttons, animate the LEDs.
async fn run(
    device: &mut Device,
    reports: &'static Signal<CriticalSectionRawMutex, GuitarReport>,
) -> ! {
    let mut engine = Engine::default();
    let mut rendered: Option<GuitarButtons> = None;
    let mut next_wave_frame = Instant::now();

    loop {
        engine.poll(&mut device.peripherals());

        let buttons = GuitarButtons::sample(&mut device.buttons);
        reports.signal(GuitarReport::new(buttons, device.whammy.read()));

        device.lighting.on_buttons(buttons);
        if device.lighting.is_running() {
            if Instant::now() >= next_wave_frame {
                if !device.lighting.step(&mut device.strip, &device.config) {
                    rendered = None;
                }
                next_wave_frame = Instant::now() + WAVE_FRAME_PERIOD;
            }
        } else if rendered != Some(buttons) {
            render_buttons(&mut device.strip, buttons, &device.config, &device.presets);
            rendered = Some(buttons);
        }

        Timer::after(LOOP_PERIOD).await;
    }
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}

/// HID task - waits for report signals and sends them to the host.
#[embassy_executor::task]
async fn hid_task(
    mut output: UsbHidOutput<'static>,
    reports: &'static Signal<CriticalSectionRawMutex, GuitarReport>,
) {
    loop {
        // Wait for USB to be ready
        output.wait_ready().await;
        info!("USB HID ready, reporting buttons...");

        loop {
            let report = reports.wait().await;
            if let Err(e) = output.send(report).await {
                warn!("HID write failed: {:?}", e);
                output.invalidate();
                break;
            }
        }
    }
}

#[embassy_executor::task]
async fn serial_rx_task(
    receiver: Receiver<'static, Driver<'static, USB>>,
    channel: &'static SerialChannel,
) {
    usb_serial::run_receiver(receiver, channel).await
}

#[embassy_executor::task]
async fn serial_tx_task(
    sender: Sender<'static, Driver<'static, USB>>,
    channel: &'static SerialChannel,
) {
    usb_serial::run_sender(sender, channel).await
}
