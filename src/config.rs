//! Hardware and timing configuration for GifDeck
//! RP2040-based six-key macro pad with one ST7735 panel per key

use embassy_time::Duration;

use crate::types::{AnimationId, ButtonIndex, GamepadButton};

// ===================================================================
// Device Specifications
// ===================================================================

pub const BUTTON_COUNT: usize = 6; // One key, one panel, one animation each

// ===================================================================
// Timing
// ===================================================================

pub const BUTTON_POLL_MS: u64 = 15; // Button polling period
pub const DEBOUNCE_WINDOW_MS: u64 = 500; // Press must settle this long before playback
pub const BUTTON_POLL_PERIOD: Duration = Duration::from_millis(BUTTON_POLL_MS);
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(DEBOUNCE_WINDOW_MS);

// ===================================================================
// Dispatch and Playback Limits
// ===================================================================

pub const DISPATCH_QUEUE_CAPACITY: usize = 5; // Pending playback requests
pub const MAX_ANIMATION_FILE_SIZE: usize = 150_000; // Larger files are rejected unread
pub const MAX_BLIT_WIDTH: usize = 160; // Columns per panel row
pub const MAX_DECODE_WIDTH: usize = 320; // Columns of a GIF row the decoder keeps

// ===================================================================
// Panel Geometry (ST7735 "mini" 160x80)
// ===================================================================

pub const PANEL_WIDTH: u16 = 160;
pub const PANEL_HEIGHT: u16 = 80;
pub const PANEL_ROW_OFFSET: u16 = 24; // Controller RAM offset in landscape
pub const PANEL_COL_OFFSET: u16 = 0;

// ===================================================================
// GPIO Pin Assignments - Raspberry Pi Pico
// ===================================================================

// Buttons (active-low, internal pull-ups)
pub const BUTTON_PINS: [u8; BUTTON_COUNT] = [2, 3, 4, 5, 6, 7];

// Panel chip selects, one per key
pub const PANEL_CS_PINS: [u8; BUTTON_COUNT] = [8, 9, 10, 11, 12, 13];

// Shared panel bus (SPI0)
pub const PANEL_SCK_PIN: u8 = 18;
pub const PANEL_MOSI_PIN: u8 = 19;
pub const PANEL_DC_PIN: u8 = 14;
pub const PANEL_RST_PIN: u8 = 15;
pub const PANEL_BL_PIN: u8 = 17;
pub const PANEL_SPI_BAUDRATE: u32 = 32_000_000;

// SD card (SPI1)
pub const SD_SCK_PIN: u8 = 26;
pub const SD_MOSI_PIN: u8 = 27;
pub const SD_MISO_PIN: u8 = 28;
pub const SD_CS_PIN: u8 = 22;
pub const SD_INIT_BAUDRATE: u32 = 400_000;
pub const SD_BAUDRATE: u32 = 16_000_000;

// Status LED
pub const LED_STATUS_PIN: u8 = 25;

// ===================================================================
// Memory
// ===================================================================

// Room for one maximum-size animation plus allocator overhead
pub const HEAP_SIZE: usize = 160 * 1024;

// ===================================================================
// USB HID Configuration
// ===================================================================

pub const USB_VID: u16 = 0x1209; // pid.codes open-source VID
pub const USB_PID: u16 = 0x6D64;
pub const USB_MANUFACTURER: &str = "GifDeck";
pub const USB_PRODUCT: &str = "GifDeck Gamepad";
pub const USB_SERIAL: &str = "GIFDECK00001";
pub const USB_POLL_RATE_MS: u8 = 10;

// ===================================================================
// Per-Key Configuration Table
// ===================================================================

/// Panel mounting orientation (ST7735 MADCTL rotation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Rotation {
    /// Landscape, connector on the right
    Landscape,
    /// Landscape, connector on the left (upside down)
    LandscapeFlipped,
}

/// Everything that ties one physical key to its panel, file and gamepad code
#[derive(Debug, Clone, Copy)]
pub struct SlotConfig {
    pub index: ButtonIndex,
    pub input_pin: u8,
    pub chip_select_pin: u8,
    pub animation: AnimationId,
    pub gamepad: GamepadButton,
    pub rotation: Rotation,
}

/// The full key table, built once at startup and shared by reference
#[derive(Debug, Clone, Copy)]
pub struct DeckConfig {
    pub slots: [SlotConfig; BUTTON_COUNT],
}

const fn slot(
    index: usize,
    animation: &'static str,
    gamepad: GamepadButton,
    rotation: Rotation,
) -> SlotConfig {
    let index = match ButtonIndex::new(index) {
        Some(index) => index,
        None => panic!("slot index out of range"),
    };
    SlotConfig {
        index,
        input_pin: BUTTON_PINS[index.get()],
        chip_select_pin: PANEL_CS_PINS[index.get()],
        animation: AnimationId::new(animation),
        gamepad,
        rotation,
    }
}

impl DeckConfig {
    /// Stock layout: top row panels mounted flipped, bottom row upright
    pub const fn standard() -> Self {
        Self {
            slots: [
                slot(0, "1.GIF", GamepadButton::BUTTON_1, Rotation::LandscapeFlipped),
                slot(1, "2.GIF", GamepadButton::BUTTON_2, Rotation::LandscapeFlipped),
                slot(2, "3.GIF", GamepadButton::BUTTON_3, Rotation::LandscapeFlipped),
                slot(3, "4.GIF", GamepadButton::BUTTON_4, Rotation::Landscape),
                slot(4, "5.GIF", GamepadButton::BUTTON_5, Rotation::Landscape),
                slot(5, "6.GIF", GamepadButton::BUTTON_6, Rotation::Landscape),
            ],
        }
    }

    pub fn slot(&self, index: ButtonIndex) -> &SlotConfig {
        &self.slots[index.get()]
    }
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self::standard()
    }
}
