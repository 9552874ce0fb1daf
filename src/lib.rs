//! GifDeck - Six-Key Animated Macro Pad for RP2040
//!
//! Each of the six keys owns a small ST7735 panel. Pressing a key reports it
//! to the host as a gamepad button right away; once the press has settled for
//! the debounce window, the key's GIF animation is played on its panel.
//!
//! ## Architecture
//! - **Button monitor**: 15ms polling, edge detection, gamepad press/release
//! - **Debounce timers**: one 500ms one-shot per key, serviced by one task
//! - **Dispatch queue**: bounded (5) FIFO feeding a single render task
//! - **Animation player**: loads, decodes and blits one animation at a time
//! - **Frame blitter**: run-length transparency, minimal panel writes
//! - **USB HID**: gamepad report task driven by shared atomic state

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Logging macros; must come first so every other module can use them
#[macro_use]
mod fmt;

pub mod blitter;
pub mod buttons;
pub mod channels;
pub mod config;
pub mod debounce;
pub mod decoder;
pub mod dispatch;
pub mod gamepad;
pub mod gif;
pub mod panel;
pub mod player;
pub mod storage;
pub mod supervisor;
pub mod types;
pub mod usb;

#[cfg(target_os = "none")]
pub mod hardware;

#[cfg(target_os = "none")]
use embassy_rp::{bind_interrupts, peripherals};

// USB interrupt binding - shared with the firmware binary
#[cfg(target_os = "none")]
bind_interrupts!(pub struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<peripherals::USB>;
});
