//! Application supervisor and monitoring
//!
//! Prints the startup banner and keeps a coarse uptime heartbeat in the log,
//! along with the dispatch backlog and host connection state.

use embassy_time::{Duration, Timer};

use crate::config::{self, DeckConfig};
use crate::dispatch::DispatchQueue;
use crate::gamepad::{GamepadTransport, HidGamepadState};
use crate::types::APP_VERSION;

const TICK_SECONDS: u32 = 10;
const STATUS_INTERVAL_SECONDS: u32 = 60;

/// Application supervisor responsible for monitoring and lifecycle management
pub struct AppSupervisor {
    config: &'static DeckConfig,
    uptime_seconds: u32,
    last_heartbeat: u32,
}

impl AppSupervisor {
    pub const fn new(config: &'static DeckConfig) -> Self {
        Self {
            config,
            uptime_seconds: 0,
            last_heartbeat: 0,
        }
    }

    /// Print application startup banner with the key table
    pub fn print_startup_banner(&self) {
        info!("========================================");
        info!(
            "GifDeck v{}.{}.{}",
            APP_VERSION.major,
            APP_VERSION.minor,
            APP_VERSION.patch
        );
        info!("Six-Key Animated Macro Pad");
        info!("========================================");
        info!("Hardware: RP2040 (Raspberry Pi Pico)");
        info!(
            "USB: VID=0x{:04X} PID=0x{:04X} (HID gamepad)",
            config::USB_VID,
            config::USB_PID
        );
        info!(
            "Panels: {}x ST7735 {}x{}",
            config::BUTTON_COUNT,
            config::PANEL_WIDTH,
            config::PANEL_HEIGHT
        );
        for slot in self.config.slots.iter() {
            info!(
                "Key {}: GP{} -> panel CS GP{}, {}, gamepad button {}",
                slot.index.get(),
                slot.input_pin,
                slot.chip_select_pin,
                slot.animation.file_name(),
                slot.gamepad.number()
            );
        }
        info!("========================================");
    }

    /// Print successful initialization message
    pub fn print_init_success(&self) {
        info!("GifDeck initialized successfully");
        info!("Waiting for USB connection...");
    }

    /// Advance the uptime by `seconds`. Returns true when a status line is due.
    pub fn advance(&mut self, seconds: u32) -> bool {
        self.uptime_seconds = self.uptime_seconds.saturating_add(seconds);
        if self.uptime_seconds - self.last_heartbeat >= STATUS_INTERVAL_SECONDS {
            self.last_heartbeat = self.uptime_seconds;
            true
        } else {
            false
        }
    }

    /// Run the main supervisor loop
    pub async fn run(&mut self, queue: &DispatchQueue, gamepad: &HidGamepadState) -> ! {
        info!("Application supervisor started");

        loop {
            Timer::after(Duration::from_secs(TICK_SECONDS as u64)).await;
            if self.advance(TICK_SECONDS) {
                self.print_status(queue, gamepad);
            }
        }
    }

    fn print_status(&self, queue: &DispatchQueue, gamepad: &HidGamepadState) {
        let (hours, minutes) = split_uptime(self.uptime_seconds);
        if hours > 0 {
            info!("Status: Uptime {}h{}m", hours, minutes);
        } else {
            info!("Status: Uptime {}m", minutes);
        }
        info!(
            "Status: {} playback(s) queued, host {}",
            queue.len(),
            if gamepad.is_connected() { "connected" } else { "not connected" }
        );
    }

    /// Get current uptime in seconds
    pub fn uptime(&self) -> u32 {
        self.uptime_seconds
    }
}

/// (hours, minutes past the hour)
fn split_uptime(seconds: u32) -> (u32, u32) {
    let minutes = seconds / 60;
    (minutes / 60, minutes % 60)
}
