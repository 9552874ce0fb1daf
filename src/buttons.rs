//! Button polling and edge detection
//!
//! This module polls the six direct (active-low) key inputs, detects press
//! and release edges, re-arms the key's debounce timer on every press and
//! reports presses/releases to the gamepad immediately.

use embassy_time::{Instant, Timer};
use embedded_hal::digital::InputPin;

use crate::config::{DeckConfig, BUTTON_COUNT, BUTTON_POLL_PERIOD};
use crate::debounce::DebounceTimerBank;
use crate::gamepad::{GamepadReporter, GamepadTransport};
use crate::types::{ButtonIndex, PressState};

// ===================================================================
// Edge Detection
// ===================================================================

/// Transition seen on one key between two polls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Edge {
    /// Released -> pressed (falling edge on the pin)
    Pressed,
    /// Pressed -> released (rising edge on the pin)
    Released,
}

pub struct EdgeDetector {
    last: [PressState; BUTTON_COUNT],
}

impl EdgeDetector {
    /// All keys start out released (pins idle high)
    pub const fn new() -> Self {
        Self {
            last: [PressState::Released; BUTTON_COUNT],
        }
    }

    pub fn update(&mut self, button: ButtonIndex, state: PressState) -> Option<Edge> {
        let last = &mut self.last[button.get()];
        if *last == state {
            return None;
        }
        *last = state;
        Some(match state {
            PressState::Pressed => Edge::Pressed,
            PressState::Released => Edge::Released,
        })
    }

    pub fn state(&self, button: ButtonIndex) -> PressState {
        self.last[button.get()]
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ===================================================================
// Button Monitor
// ===================================================================

pub struct ButtonMonitor<'a, P: InputPin, T: GamepadTransport> {
    inputs: [P; BUTTON_COUNT],
    edges: EdgeDetector,
    timers: &'a DebounceTimerBank,
    gamepad: GamepadReporter<'a, T>,
}

impl<'a, P: InputPin, T: GamepadTransport> ButtonMonitor<'a, P, T> {
    pub fn new(
        inputs: [P; BUTTON_COUNT],
        config: &'a DeckConfig,
        timers: &'a DebounceTimerBank,
        transport: T,
    ) -> Self {
        Self {
            inputs,
            edges: EdgeDetector::new(),
            timers,
            gamepad: GamepadReporter::new(transport, config),
        }
    }

    /// One pass over every key
    pub fn poll(&mut self, now: Instant) {
        for button in ButtonIndex::all() {
            let state = match self.inputs[button.get()].is_low() {
                Ok(is_low) => PressState::from_low(is_low),
                Err(_) => {
                    warn!("Button {} read failed", button.get());
                    continue;
                }
            };

            match self.edges.update(button, state) {
                Some(Edge::Pressed) => {
                    info!("Button {} pressed", button.get());
                    self.timers.reset_at(button, now);
                    self.gamepad.press(button);
                }
                Some(Edge::Released) => {
                    debug!("Button {} released", button.get());
                    self.gamepad.release(button);
                }
                None => {}
            }
        }
    }

    pub async fn run(&mut self) -> ! {
        info!("Button task (direct) started");

        loop {
            self.poll(Instant::now());
            Timer::after(BUTTON_POLL_PERIOD).await;
        }
    }
}
