//! Boot-time handoff for USB-updatable Cortex-M bootloaders.
//!
//! On every reset the bootloader keeps the USB update mechanism serviced for a
//! bounded window. When the window expires without update activity, the
//! flashed application is checked and, if it looks plausible, control is
//! handed over to it for good.
//!
//! The pieces are layered leaves first:
//! - [`tick`]: coarse tick source bounding the window.
//! - [`image`]: vector table view and stack-pointer plausibility check.
//! - [`window`]: the cooperative update-window state machine.
//! - [`handoff`]: the one-way jump into the application.
//! - [`boot`]: glue deciding between launching and staying resident.
//! - [`mailbox`]: a RAM word that survives a soft reset and forces update mode.
//!
//! Hardware is always passed in as owned handles so that every component can be
//! driven by simulated clocks, pins and processors on the host.
#![cfg_attr(not(test), no_std)]

pub mod boot;
#[cfg(target_arch = "arm")]
pub mod armv7m;
pub mod handoff;
pub mod image;
pub mod mailbox;
pub mod tick;
pub mod window;

pub use boot::{decide, stay_resident, Decision, ImageGate, Residency};
pub use handoff::{Handoff, Processor, Target};
pub use image::{RamWindow, VectorTable};
pub use mailbox::{BootRequest, Mailbox};
pub use tick::{ConfigError, Reload, TickClock, TickConfig, TickSource};
pub use window::{
    Deadline, Indicator, Polarity, Session, SessionLatch, UpdateMechanism, UpdateWindow,
    WindowState,
};
