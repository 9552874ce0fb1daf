//! Hardware bring-up and firmware tasks (RP2040 only)
//!
//! This module owns the pin assignment for the stock board, builds the panel
//! and SD card buses, sets up the heap and defines the executor tasks that
//! wrap the portable pieces of the crate.

use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::spi::{Blocking, Config as SpiConfig, Phase, Polarity, Spi};
use embassy_rp::usb::Driver;
use embassy_rp::{peripherals, Peripherals};
use embassy_time::{Delay, Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use linked_list_allocator::LockedHeap;
use static_cell::StaticCell;

use crate::buttons::ButtonMonitor;
use crate::channels::{DEBOUNCE_TIMERS, DECK_CONFIG, DISPATCH_QUEUE, GAMEPAD};
use crate::config::*;
use crate::gif::GifDecoder;
use crate::panel::PanelArray;
use crate::player::AnimationPlayer;
use crate::storage::SdStore;

// ===================================================================
// Heap
// ===================================================================

// Animation files are loaded whole into a heap buffer
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

/// Hand the heap region to the allocator. Call once, before any allocation.
pub fn init_heap() {
    unsafe {
        ALLOCATOR
            .lock()
            .init(core::ptr::addr_of_mut!(HEAP) as *mut u8, HEAP_SIZE);
    }
    info!("Heap: {} KB", HEAP_SIZE / 1024);
}

// ===================================================================
// Board Types
// ===================================================================

pub type PanelBus = Spi<'static, peripherals::SPI0, Blocking>;
pub type Panels = PanelArray<PanelBus, Output<'static>, Output<'static>>;

pub type SdBus = ExclusiveDevice<Spi<'static, peripherals::SPI1, Blocking>, Output<'static>, Delay>;
pub type Store = SdStore<SdBus, Delay>;

pub type DeckPlayer = AnimationPlayer<Store, &'static mut GifDecoder, Panels>;

static DECODER: StaticCell<GifDecoder> = StaticCell::new();

/// Everything the tasks need, split out of the peripherals
pub struct Board {
    pub buttons: [Input<'static>; BUTTON_COUNT],
    pub panels: Panels,
    pub panel_reset: Output<'static>,
    pub backlight: Output<'static>,
    pub store: Store,
    pub usb: Driver<'static, peripherals::USB>,
    pub status_led: Output<'static>,
}

impl Board {
    pub fn new(p: Peripherals) -> Self {
        info!("Initializing board");

        // Buttons: GP2..GP7, active low (BUTTON_PINS)
        let buttons = [
            Input::new(p.PIN_2, Pull::Up),
            Input::new(p.PIN_3, Pull::Up),
            Input::new(p.PIN_4, Pull::Up),
            Input::new(p.PIN_5, Pull::Up),
            Input::new(p.PIN_6, Pull::Up),
            Input::new(p.PIN_7, Pull::Up),
        ];

        // Panel chip selects: GP8..GP13 (PANEL_CS_PINS), idle high
        let chip_selects = [
            Output::new(p.PIN_8, Level::High),
            Output::new(p.PIN_9, Level::High),
            Output::new(p.PIN_10, Level::High),
            Output::new(p.PIN_11, Level::High),
            Output::new(p.PIN_12, Level::High),
            Output::new(p.PIN_13, Level::High),
        ];

        // Shared panel bus on SPI0: SCK GP18, MOSI GP19, DC GP14, RST GP15, BL GP17
        let mut panel_spi_config = SpiConfig::default();
        panel_spi_config.frequency = PANEL_SPI_BAUDRATE;
        panel_spi_config.phase = Phase::CaptureOnFirstTransition;
        panel_spi_config.polarity = Polarity::IdleLow;
        let panel_spi = Spi::new_blocking_txonly(p.SPI0, p.PIN_18, p.PIN_19, panel_spi_config);
        let dc = Output::new(p.PIN_14, Level::Low);
        let panel_reset = Output::new(p.PIN_15, Level::High);
        let backlight = Output::new(p.PIN_17, Level::Low);
        let panels = PanelArray::new(panel_spi, dc, chip_selects, &DECK_CONFIG);

        // SD card on SPI1: SCK GP26, MOSI GP27, MISO GP28, CS GP22
        let mut sd_spi_config = SpiConfig::default();
        sd_spi_config.frequency = SD_INIT_BAUDRATE;
        let sd_spi = Spi::new_blocking(p.SPI1, p.PIN_26, p.PIN_27, p.PIN_28, sd_spi_config);
        let sd_cs = Output::new(p.PIN_22, Level::High);
        let sd_device = defmt::unwrap!(ExclusiveDevice::new(sd_spi, sd_cs, Delay));
        let card = SdCard::new(sd_device, Delay);
        match card.num_bytes() {
            Ok(bytes) => info!("SD card: {} MB", bytes / 1024 / 1024),
            Err(e) => warn!("SD card probe failed: {:?}", e),
        }
        // Card is initialized; switch to the fast clock
        card.spi(|device| device.bus_mut().set_frequency(SD_BAUDRATE));
        let store = SdStore::new(card);

        let usb = Driver::new(p.USB, crate::Irqs);
        let status_led = Output::new(p.PIN_25, Level::Low);

        Self {
            buttons,
            panels,
            panel_reset,
            backlight,
            store,
            usb,
            status_led,
        }
    }
}

/// Build the player around the mounted store and the panel array
pub fn create_player(store: Store, panels: Panels) -> DeckPlayer {
    AnimationPlayer::new(store, DECODER.init(GifDecoder::new()), panels)
}

/// One reset pulse on the line shared by all panels
pub async fn reset_panels(reset: &mut Output<'static>) {
    reset.set_high();
    Timer::after(Duration::from_millis(50)).await;
    reset.set_low();
    Timer::after(Duration::from_millis(50)).await;
    reset.set_high();
    Timer::after(Duration::from_millis(150)).await;
}

// ===================================================================
// Tasks
// ===================================================================

#[embassy_executor::task]
pub async fn button_task(inputs: [Input<'static>; BUTTON_COUNT]) {
    let mut monitor = ButtonMonitor::new(inputs, &DECK_CONFIG, &DEBOUNCE_TIMERS, &GAMEPAD);
    monitor.run().await
}

#[embassy_executor::task]
pub async fn debounce_task() {
    DEBOUNCE_TIMERS.run(&DECK_CONFIG, &DISPATCH_QUEUE).await
}

#[embassy_executor::task]
pub async fn player_task(
    mut player: DeckPlayer,
    mut panel_reset: Output<'static>,
    mut backlight: Output<'static>,
) {
    reset_panels(&mut panel_reset).await;
    if let Err(e) = player.panels().init().await {
        error!("Panel init failed: {:?}", e);
    }
    backlight.set_high();

    player.run(&DISPATCH_QUEUE).await
}

#[embassy_executor::task]
pub async fn status_task(mut status_led: Output<'static>) {
    info!("Status LED task started");

    loop {
        // Heartbeat pattern - short blink every second
        status_led.set_high();
        Timer::after(Duration::from_millis(100)).await;
        status_led.set_low();
        Timer::after(Duration::from_millis(900)).await;
    }
}
