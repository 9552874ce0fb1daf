//! GifDeck firmware
//!
//! - 6 keys, each with its own 160x80 ST7735 panel
//! - GIF animations 1.GIF..6.GIF from the SD card root
//! - USB HID gamepad, buttons 1..6
//!
//! Only meaningful for the RP2040 target; host builds get an empty main so
//! the workspace still builds and tests on a desktop.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use {
    defmt::{info, unwrap},
    defmt_rtt as _,
    embassy_executor::Executor,
    gifdeck::channels::{DECK_CONFIG, DISPATCH_QUEUE, GAMEPAD},
    gifdeck::storage::mount_with_fallback,
    gifdeck::{hardware, supervisor, usb},
    panic_halt as _,
    static_cell::StaticCell,
};

#[cfg(target_os = "none")]
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

/// Main application entry point
#[cfg(target_os = "none")]
#[cortex_m_rt::entry]
fn main() -> ! {
    // Initialize hardware
    let p = embassy_rp::init(Default::default());
    hardware::init_heap();

    let supervisor = supervisor::AppSupervisor::new(&DECK_CONFIG);
    supervisor.print_startup_banner();

    let hardware::Board {
        buttons,
        panels,
        panel_reset,
        backlight,
        mut store,
        usb,
        status_led,
    } = hardware::Board::new(p);

    // No filesystem means nothing to play: stay idle without starting anything
    if mount_with_fallback(&mut store).is_err() {
        loop {
            cortex_m::asm::wfe();
        }
    }

    let player = hardware::create_player(store, panels);

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        unwrap!(spawner.spawn(usb::usb_task(usb)));
        unwrap!(spawner.spawn(hardware::button_task(buttons)));
        unwrap!(spawner.spawn(hardware::debounce_task()));
        unwrap!(spawner.spawn(hardware::player_task(player, panel_reset, backlight)));
        unwrap!(spawner.spawn(hardware::status_task(status_led)));
        unwrap!(spawner.spawn(supervisor_task(supervisor)));
    });
}

/// Supervision: init message, then the uptime heartbeat
#[cfg(target_os = "none")]
#[embassy_executor::task]
async fn supervisor_task(mut supervisor: supervisor::AppSupervisor) {
    info!("All tasks spawned");
    supervisor.print_init_success();
    supervisor.run(&DISPATCH_QUEUE, &GAMEPAD).await
}

#[cfg(not(target_os = "none"))]
fn main() {}
