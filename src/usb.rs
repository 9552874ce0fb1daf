//! USB HID gamepad
//!
//! The deck enumerates as a plain HID gamepad with eight buttons (six used).
//! The input report is a single byte, one bit per button. The host counts as
//! connected while the device is configured; reports are sent whenever the
//! button bitmap changes.

use embassy_futures::join::join;
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, State};
use embassy_usb::driver::Driver;
use embassy_usb::{Builder, Config, Handler};
use static_cell::StaticCell;

use crate::config::*;
use crate::gamepad::{GamepadTransport, HidGamepadState};

// ===================================================================
// USB HID Report Descriptor (Gamepad, 8 buttons, 1 byte)
// ===================================================================

pub const HID_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Game Pad)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (Button 1)
    0x29, 0x08, //   Usage Maximum (Button 8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data,Var,Abs)
    0xC0, // End Collection
];

pub const REPORT_LEN: usize = 1;

/// Input report for a button bitmap
pub const fn gamepad_report(buttons: u8) -> [u8; REPORT_LEN] {
    [buttons]
}

// ===================================================================
// USB Configuration
// ===================================================================

pub fn create_usb_config() -> Config<'static> {
    let mut config = Config::new(USB_VID, USB_PID);
    config.manufacturer = Some(USB_MANUFACTURER);
    config.product = Some(USB_PRODUCT);
    config.serial_number = Some(USB_SERIAL);
    config.max_power = 100;
    config.max_packet_size_0 = 64;
    config.device_class = 0x00; // Interface-defined
    config.device_sub_class = 0x00;
    config.device_protocol = 0x00;
    config.composite_with_iads = false;
    config
}

// ===================================================================
// Device State Handler
// ===================================================================

/// Maps USB device state onto the gamepad's connection flag
pub struct GamepadHandler {
    state: &'static HidGamepadState,
}

impl GamepadHandler {
    pub const fn new(state: &'static HidGamepadState) -> Self {
        Self { state }
    }
}

impl Handler for GamepadHandler {
    fn enabled(&mut self, enabled: bool) {
        if !enabled {
            self.state.set_connected(false);
        }
    }

    fn reset(&mut self) {
        self.state.set_connected(false);
    }

    fn configured(&mut self, configured: bool) {
        self.state.set_connected(configured);
    }

    fn suspended(&mut self, suspended: bool) {
        // A suspended host is not listening for reports
        if suspended {
            self.state.set_connected(false);
        }
    }
}

// ===================================================================
// USB Task Implementation
// ===================================================================

/// Build the USB device and serve the gamepad forever. Call once.
pub async fn run_gamepad<D: Driver<'static>>(driver: D, state: &'static HidGamepadState) -> ! {
    info!("USB task started");

    static CONFIG_DESC_BUF: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESC_BUF: StaticCell<[u8; 256]> = StaticCell::new();
    static MSOS_DESC_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    static HANDLER: StaticCell<GamepadHandler> = StaticCell::new();
    static HID_STATE: StaticCell<State<'static>> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        create_usb_config(),
        CONFIG_DESC_BUF.init([0; 256]),
        BOS_DESC_BUF.init([0; 256]),
        MSOS_DESC_BUF.init([0; 64]),
        CONTROL_BUF.init([0; 64]),
    );
    builder.handler(HANDLER.init(GamepadHandler::new(state)));

    let hid_config = HidConfig {
        report_descriptor: HID_REPORT_DESCRIPTOR,
        request_handler: None,
        poll_ms: USB_POLL_RATE_MS,
        max_packet_size: 8,
    };
    let mut writer = HidWriter::<_, 8>::new(&mut builder, HID_STATE.init(State::new()), hid_config);

    let mut usb = builder.build();
    info!(
        "USB gamepad VID=0x{:04X} PID=0x{:04X}, descriptor {} bytes",
        USB_VID,
        USB_PID,
        HID_REPORT_DESCRIPTOR.len()
    );

    let report_fut = async {
        loop {
            let buttons = state.wait_changed().await;
            if !state.is_connected() {
                continue;
            }
            match writer.write(&gamepad_report(buttons)).await {
                Ok(()) => debug!("Gamepad report sent: {:b}", buttons),
                Err(e) => warn!("Failed to send gamepad report: {:?}", e),
            }
        }
    };

    join(usb.run(), report_fut).await.0
}

#[cfg(target_os = "none")]
#[embassy_executor::task]
pub async fn usb_task(driver: embassy_rp::usb::Driver<'static, embassy_rp::peripherals::USB>) {
    run_gamepad(driver, &crate::channels::GAMEPAD).await
}
