#![no_std]
#![no_main]

mod board;
mod config;
mod usb;

use cortex_m_rt::entry;
use defmt_rtt as _;
use handoff::armv7m::{CortexM, SysTickSource};
use handoff::mailbox::MAILBOX_ADDR;
use handoff::{
    decide, stay_resident, BootRequest, Decision, Handoff, Indicator, Mailbox, UpdateWindow,
    VectorTable,
};
use panic_halt as _;
use stm32f4xx_hal::{otg_fs::USB, pac, prelude::*, rcc::Config};

use crate::board::Board;
use crate::usb::UsbUpdater;

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    // Read before anything else touches RAM near the top of the stack.
    // SAFETY: the mailbox word is carved out of RAM in memory.x.
    let mut mailbox = unsafe { Mailbox::at(MAILBOX_ADDR as *mut u32) };
    let request = mailbox.take();

    let rcc = dp.RCC.constrain();
    let mut rcc = rcc.freeze(
        Config::hse(config::HSE)
            .sysclk(config::SYSCLK)
            .require_pll48clk(),
    );
    defmt::debug_assert_eq!(rcc.clocks.hclk().raw(), config::SYSCLK.raw());

    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpioc = dp.GPIOC.split(&mut rcc);

    let led = gpioc.pc13.into_push_pull_output();
    let mut indicator = Indicator::new(led, config::LED_POLARITY);

    let usb = USB::new(
        (dp.OTG_FS_GLOBAL, dp.OTG_FS_DEVICE, dp.OTG_FS_PWRCLK),
        (gpioa.pa11, gpioa.pa12),
        &rcc.clocks,
    );
    let mut updater = UsbUpdater::new(usb);

    if request == Some(BootRequest::StayInUpdate) {
        defmt::info!("update mode requested by application");
        stay_resident(&mut updater, &mut indicator);
    }

    let ticks = SysTickSource::new(cp.SYST, config::TICK.source, config::TICK_RELOAD);
    let mut window = UpdateWindow::new(ticks, updater, indicator, config::DEADLINE);
    let outcome = window.run();
    let (ticks, mut updater, mut indicator) = window.into_parts();

    // SAFETY: the application region is always-mapped internal flash.
    let table = unsafe { VectorTable::read(config::APP_BASE_ADDRESS as *const u32) };

    match decide(outcome, table, &config::RAM_WINDOW, config::IMAGE_GATE) {
        Decision::Launch(table) => {
            let board = Board::new(cp.SCB, ticks.release(), cp.NVIC);
            // SAFETY: `table` was read from APP_BASE_ADDRESS and passed the
            // image gate.
            unsafe { Handoff::new(board, CortexM::new()).launch(config::APP_BASE_ADDRESS, &table) }
        }
        Decision::Resident(reason) => {
            defmt::info!("staying in update mode: {}", reason);
            stay_resident(&mut updater, &mut indicator)
        }
    }
}
