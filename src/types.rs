//! Common types shared across the GifDeck application
//!
//! Index newtypes keep buttons, surfaces and gamepad codes from being mixed
//! up, and `DispatchRequest` is the value that travels from the debounce
//! timers to the render task.

use crate::config::BUTTON_COUNT;

/// Logical button index (0..BUTTON_COUNT)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct ButtonIndex(u8);

impl ButtonIndex {
    /// Create an index, rejecting anything past the last button
    pub const fn new(index: usize) -> Option<Self> {
        if index < BUTTON_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// Every button index in order
    pub fn all() -> impl Iterator<Item = ButtonIndex> {
        (0..BUTTON_COUNT as u8).map(ButtonIndex)
    }

    /// Surface driven by this button (fixed 1:1 correspondence)
    pub const fn surface(self) -> SurfaceIndex {
        SurfaceIndex(self.0)
    }
}

/// Display surface index (0..BUTTON_COUNT)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct SurfaceIndex(u8);

impl SurfaceIndex {
    pub const fn new(index: usize) -> Option<Self> {
        if index < BUTTON_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// Stored animation, identified by its file name on the card
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct AnimationId(&'static str);

impl AnimationId {
    pub const fn new(file_name: &'static str) -> Self {
        Self(file_name)
    }

    pub const fn file_name(self) -> &'static str {
        self.0
    }
}

/// Gamepad button number as seen by the host (1-based)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct GamepadButton(u8);

impl GamepadButton {
    pub const BUTTON_1: Self = Self(1);
    pub const BUTTON_2: Self = Self(2);
    pub const BUTTON_3: Self = Self(3);
    pub const BUTTON_4: Self = Self(4);
    pub const BUTTON_5: Self = Self(5);
    pub const BUTTON_6: Self = Self(6);

    pub const fn number(self) -> u8 {
        self.0
    }

    /// Bit in the one-byte HID button report
    pub const fn mask(self) -> u8 {
        1 << (self.0 - 1)
    }
}

/// "Play this animation on this surface"
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct DispatchRequest {
    pub surface: SurfaceIndex,
    pub animation: AnimationId,
}

/// Logical button level after active-low translation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum PressState {
    Released,
    Pressed,
}

impl PressState {
    /// Active-low input: a low level means the key is held down
    pub const fn from_low(is_low: bool) -> Self {
        if is_low {
            PressState::Pressed
        } else {
            PressState::Released
        }
    }
}

/// Application version information
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl AppVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }
}

/// Current application version
pub const APP_VERSION: AppVersion = AppVersion::new(0, 1, 0);
