//! Gamepad reporting
//!
//! `GamepadReporter` maps a key index to its gamepad button and forwards
//! press/release to a [`GamepadTransport`], but only while a host is
//! connected. Changes made while disconnected are dropped, not replayed.
//!
//! `HidGamepadState` is the transport used on the device: the button monitor
//! writes it, the USB HID task reads it and sends reports.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::config::DeckConfig;
use crate::types::{ButtonIndex, GamepadButton};

/// Host-facing side of the gamepad
pub trait GamepadTransport {
    /// Whether a host is currently connected and listening for reports
    fn is_connected(&self) -> bool;

    fn press(&self, button: GamepadButton);

    fn release(&self, button: GamepadButton);
}

impl<T: GamepadTransport + ?Sized> GamepadTransport for &T {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn press(&self, button: GamepadButton) {
        (**self).press(button)
    }

    fn release(&self, button: GamepadButton) {
        (**self).release(button)
    }
}

pub struct GamepadReporter<'a, T: GamepadTransport> {
    transport: T,
    config: &'a DeckConfig,
}

impl<'a, T: GamepadTransport> GamepadReporter<'a, T> {
    pub fn new(transport: T, config: &'a DeckConfig) -> Self {
        Self { transport, config }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Report `button` as held. Returns false if no host was connected.
    pub fn press(&self, button: ButtonIndex) -> bool {
        if !self.transport.is_connected() {
            return false;
        }
        self.transport.press(self.config.slot(button).gamepad);
        true
    }

    /// Report `button` as released. Returns false if no host was connected.
    pub fn release(&self, button: ButtonIndex) -> bool {
        if !self.transport.is_connected() {
            return false;
        }
        self.transport.release(self.config.slot(button).gamepad);
        true
    }
}

/// Shared gamepad state between the button monitor and the USB HID task
pub struct HidGamepadState {
    connected: AtomicBool,
    buttons: AtomicU8,
    changed: Signal<CriticalSectionRawMutex, ()>,
}

impl HidGamepadState {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            buttons: AtomicU8::new(0),
            changed: Signal::new(),
        }
    }

    /// Called by the transport when the host connects or goes away
    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        if was != connected {
            info!("Gamepad host {}", if connected { "connected" } else { "disconnected" });
            if connected {
                // New host starts from the all-released bitmap
                self.changed.signal(());
            } else {
                // Releases while away are dropped, so nothing may stay held
                self.buttons.store(0, Ordering::Release);
            }
        }
    }

    /// Current button bitmap (bit n = gamepad button n+1)
    pub fn buttons(&self) -> u8 {
        self.buttons.load(Ordering::Acquire)
    }

    /// Wait until the bitmap changed, then return it
    pub async fn wait_changed(&self) -> u8 {
        self.changed.wait().await;
        self.buttons()
    }
}

impl Default for HidGamepadState {
    fn default() -> Self {
        Self::new()
    }
}

impl GamepadTransport for HidGamepadState {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn press(&self, button: GamepadButton) {
        self.buttons.fetch_or(button.mask(), Ordering::AcqRel);
        self.changed.signal(());
    }

    fn release(&self, button: GamepadButton) {
        self.buttons.fetch_and(!button.mask(), Ordering::AcqRel);
        self.changed.signal(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingTransport {
        connected: core::cell::Cell<bool>,
        calls: RefCell<Vec<(bool, u8)>>,
    }

    impl GamepadTransport for RecordingTransport {
        fn is_connected(&self) -> bool {
            self.connected.get()
        }

        fn press(&self, button: GamepadButton) {
            self.calls.borrow_mut().push((true, button.number()));
        }

        fn release(&self, button: GamepadButton) {
            self.calls.borrow_mut().push((false, button.number()));
        }
    }

    fn key(i: usize) -> ButtonIndex {
        ButtonIndex::new(i).unwrap()
    }

    #[test]
    fn disconnected_host_gets_no_transport_calls() {
        let config = DeckConfig::standard();
        let transport = RecordingTransport::default();
        let reporter = GamepadReporter::new(&transport, &config);

        assert!(!reporter.press(key(0)));
        assert!(!reporter.release(key(0)));
        assert!(transport.calls.borrow().is_empty());

        transport.connected.set(true);
        assert!(reporter.press(key(2)));
        assert!(reporter.release(key(2)));
        assert_eq!(transport.calls.borrow().as_slice(), &[(true, 3), (false, 3)]);
    }

    #[test]
    fn hid_state_tracks_bitmap() {
        let state = HidGamepadState::new();
        state.press(GamepadButton::BUTTON_1);
        state.press(GamepadButton::BUTTON_4);
        assert_eq!(state.buttons(), 0b0000_1001);
        state.release(GamepadButton::BUTTON_1);
        assert_eq!(state.buttons(), 0b0000_1000);
    }

    #[test]
    fn hid_state_gates_reporter_on_connection() {
        let config = DeckConfig::standard();
        let state = HidGamepadState::new();
        let reporter = GamepadReporter::new(&state, &config);

        assert!(!reporter.press(key(5)));
        assert_eq!(state.buttons(), 0);

        state.set_connected(true);
        assert!(reporter.press(key(5)));
        assert_eq!(embassy_futures::block_on(state.wait_changed()), 0b0010_0000);
    }

    #[test]
    fn key_released_while_away_is_not_held_after_reconnect() {
        let config = DeckConfig::standard();
        let state = HidGamepadState::new();
        let reporter = GamepadReporter::new(&state, &config);

        state.set_connected(true);
        assert!(reporter.press(key(1)));
        assert_eq!(state.buttons(), 0b0000_0010);

        state.set_connected(false);
        assert!(!reporter.release(key(1)));
        assert_eq!(state.buttons(), 0);

        state.set_connected(true);
        assert_eq!(embassy_futures::block_on(state.wait_changed()), 0);
    }
}
