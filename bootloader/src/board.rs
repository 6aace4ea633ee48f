//! Target hooks for the STM32F411 Blackpill.

use cortex_m::peripheral::{NVIC, SCB, SYST};
use handoff::armv7m;
use handoff::Target;
use stm32f4xx_hal::pac;

/// Hardware the bootloader still owns at handoff time.
pub struct Board {
    scb: SCB,
    syst: SYST,
    nvic: NVIC,
}

impl Board {
    pub fn new(scb: SCB, syst: SYST, nvic: NVIC) -> Self {
        Self { scb, syst, nvic }
    }
}

impl Target for Board {
    fn relocate_vector_table(&mut self, base: u32) {
        armv7m::relocate_vector_table(&mut self.scb, base);
    }

    fn pre_jump(&mut self) {
        self.syst.disable_counter();
        self.syst.disable_interrupt();
        SCB::clear_pendst();

        // Reset OTG FS so the host sees a detach and the application can
        // bring USB up from scratch.
        // SAFETY: the USB device is never polled again after this point.
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.ahb2rstr().modify(|_, w| w.otgfsrst().set_bit());
        rcc.ahb2rstr().modify(|_, w| w.otgfsrst().clear_bit());
        rcc.ahb2enr().modify(|_, w| w.otgfsen().clear_bit());

        armv7m::quiesce_nvic(&mut self.nvic);
    }
}
