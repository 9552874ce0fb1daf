//! Shared state between tasks
//!
//! This module defines the statics the firmware tasks communicate through.
//! All of them are interior-mutable and safe to touch from any task.

use crate::config::{DeckConfig, DEBOUNCE_WINDOW};
use crate::debounce::DebounceTimerBank;
use crate::dispatch::DispatchQueue;
use crate::gamepad::HidGamepadState;

/// Key table for the stock hardware
pub static DECK_CONFIG: DeckConfig = DeckConfig::standard();

/// Playback requests from the debounce timer service to the player task
/// Capacity: 5 (new requests are dropped when full)
pub static DISPATCH_QUEUE: DispatchQueue = DispatchQueue::new();

/// One debounce deadline per key, re-armed by the button task
pub static DEBOUNCE_TIMERS: DebounceTimerBank = DebounceTimerBank::new(DEBOUNCE_WINDOW);

/// Gamepad bitmap and host connection flag, flushed by the USB task
pub static GAMEPAD: HidGamepadState = HidGamepadState::new();
