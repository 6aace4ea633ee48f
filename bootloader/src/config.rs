//! Board and boot policy configuration.
//!
//! Anything that can be checked is checked in `const` context, so a bad value
//! fails the build instead of bricking the board.

use fugit::{HertzU32, MillisDurationU32};
use handoff::mailbox::MAILBOX_ADDR;
use handoff::{Deadline, ImageGate, Polarity, RamWindow, Reload, TickClock, TickConfig};

/// Start of the application image (flash sector 2). Must match `app/memory.x`.
pub const APP_BASE_ADDRESS: u32 = 0x0800_8000;

/// External crystal on the Blackpill.
pub const HSE: HertzU32 = HertzU32::MHz(25);
/// 48 MHz keeps the OTG FS clock exact.
pub const SYSCLK: HertzU32 = HertzU32::MHz(48);

pub const TICK: TickConfig = TickConfig {
    clock: SYSCLK,
    source: TickClock::CoreDiv8,
    period: MillisDurationU32::millis(1000),
};

pub const TICK_RELOAD: Reload = match TICK.reload() {
    Ok(reload) => reload,
    Err(_) => panic!("tick period does not fit SysTick"),
};

/// Seconds to wait for a host before booting the application.
pub const DEADLINE: Deadline = Deadline(5);

pub const RAM_WINDOW: RamWindow = RamWindow::DEFAULT;

pub const IMAGE_GATE: ImageGate = ImageGate::Enforced;

/// PC13 LED on the Blackpill is wired to VCC.
pub const LED_POLARITY: Polarity = Polarity::ActiveLow;

// pid.codes test VID/PID
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0001;

const _: () = assert!(RAM_WINDOW.is_valid(MAILBOX_ADDR), "mailbox outside RAM");
