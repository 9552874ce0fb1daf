//! Per-key one-shot debounce timers
//!
//! Each key has a deadline slot. A press re-arms its slot to a full window
//! from now; a single timer-service task sleeps until the earliest deadline
//! and, for every slot that expired, pushes one playback request. A key that
//! keeps bouncing keeps pushing its deadline out, so only a settled press
//! produces playback.

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;

use crate::config::{DeckConfig, BUTTON_COUNT};
use crate::dispatch::DispatchQueue;
use crate::types::{ButtonIndex, DispatchRequest};

pub struct DebounceTimerBank {
    deadlines: Mutex<CriticalSectionRawMutex, RefCell<[Option<Instant>; BUTTON_COUNT]>>,
    rearmed: Signal<CriticalSectionRawMutex, ()>,
    window: Duration,
}

impl DebounceTimerBank {
    pub const fn new(window: Duration) -> Self {
        Self {
            deadlines: Mutex::new(RefCell::new([None; BUTTON_COUNT])),
            rearmed: Signal::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Restart the countdown for `button` at a full window from now
    pub fn reset(&self, button: ButtonIndex) {
        self.reset_at(button, Instant::now());
    }

    /// Restart the countdown for `button` at a full window from `now`.
    /// Any pending expiry for that key is cancelled.
    pub fn reset_at(&self, button: ButtonIndex, now: Instant) {
        let deadline = now + self.window;
        self.deadlines.lock(|deadlines| {
            deadlines.borrow_mut()[button.get()] = Some(deadline);
        });
        self.rearmed.signal(());
    }

    pub fn is_armed(&self, button: ButtonIndex) -> bool {
        self.deadlines
            .lock(|deadlines| deadlines.borrow()[button.get()].is_some())
    }

    /// Earliest pending deadline, if any key is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines
            .lock(|deadlines| deadlines.borrow().iter().flatten().min().copied())
    }

    /// Disarm and return every key whose window has elapsed at `now`
    pub fn expire(&self, now: Instant) -> Vec<ButtonIndex, BUTTON_COUNT> {
        let mut fired = Vec::new();
        self.deadlines.lock(|deadlines| {
            let mut deadlines = deadlines.borrow_mut();
            for button in ButtonIndex::all() {
                let slot = &mut deadlines[button.get()];
                if matches!(*slot, Some(deadline) if deadline <= now) {
                    *slot = None;
                    // Capacity equals the number of keys
                    let _ = fired.push(button);
                }
            }
        });
        fired
    }

    /// Expire due timers and enqueue one request per fired key.
    /// Returns how many requests made it into the queue.
    pub fn fire(&self, now: Instant, config: &DeckConfig, queue: &DispatchQueue) -> usize {
        let mut enqueued = 0;
        for button in self.expire(now) {
            let request = DispatchRequest {
                surface: button.surface(),
                animation: config.slot(button).animation,
            };
            match queue.push(request) {
                Ok(()) => {
                    debug!("Debounce: key {} settled, playback queued", button.get());
                    enqueued += 1;
                }
                Err(_) => {
                    debug!("Debounce: queue full, dropped request for key {}", button.get());
                }
            }
        }
        enqueued
    }

    /// Timer-service loop. Sleeps until the earliest deadline or until a key
    /// is re-armed, then fires whatever is due.
    pub async fn run(&self, config: &DeckConfig, queue: &DispatchQueue) -> ! {
        info!("Debounce timer service started");

        loop {
            match self.next_deadline() {
                Some(deadline) => {
                    if let Either::First(()) = select(Timer::at(deadline), self.rearmed.wait()).await {
                        self.fire(Instant::now(), config, queue);
                    }
                }
                None => self.rearmed.wait().await,
            }
        }
    }
}
