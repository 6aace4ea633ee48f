//! ARMv7-M backends: SysTick tick source, VTOR relocation and the jump itself.

use core::arch::asm;

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{NVIC, SCB, SYST};

use crate::handoff::Processor;
use crate::tick::{Reload, TickClock, TickSource};

/// SysTick polled through its COUNTFLAG.
pub struct SysTickSource {
    syst: SYST,
}

impl SysTickSource {
    /// Programs and starts the counter. Use [`crate::TickConfig::reload`] to
    /// obtain `reload`.
    pub fn new(mut syst: SYST, clock: TickClock, reload: Reload) -> Self {
        syst.disable_counter();
        syst.disable_interrupt();
        syst.set_clock_source(match clock {
            TickClock::Core => SystClkSource::Core,
            TickClock::CoreDiv8 => SystClkSource::External,
        });
        syst.set_reload(reload.get());
        syst.clear_current();
        // A stale COUNTFLAG would count as a tick.
        let _ = syst.has_wrapped();
        syst.enable_counter();
        Self { syst }
    }

    /// Stops the counter and hands the peripheral back.
    pub fn release(mut self) -> SYST {
        self.syst.disable_counter();
        self.syst.clear_current();
        self.syst
    }
}

impl TickSource for SysTickSource {
    fn tick_elapsed(&mut self) -> bool {
        // COUNTFLAG clears on read.
        self.syst.has_wrapped()
    }
}

/// Writes SCB.VTOR.
pub fn relocate_vector_table(scb: &mut SCB, base: u32) {
    // SAFETY: VTOR only takes effect on the next exception entry, and
    // interrupts are masked until the application runs.
    unsafe { scb.vtor.write(base) };
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

/// Disables every external interrupt and drops anything pending, so the
/// application never receives an IRQ the bootloader armed.
pub fn quiesce_nvic(nvic: &mut NVIC) {
    for (icer, icpr) in nvic.icer.iter().zip(nvic.icpr.iter()) {
        // SAFETY: write-one-to-clear registers; zero bits have no effect.
        unsafe {
            icer.write(u32::MAX);
            icpr.write(u32::MAX);
        }
    }
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

/// Main-stack Cortex-M core.
///
/// Control reaches the application with PRIMASK set; it must enable
/// interrupts itself.
#[derive(Default)]
pub struct CortexM {
    stack_pointer: u32,
}

impl CortexM {
    pub const fn new() -> Self {
        Self { stack_pointer: 0 }
    }
}

impl Processor for CortexM {
    fn mask_interrupts(&mut self) {
        cortex_m::interrupt::disable();
    }

    /// The MSP write is deferred into [`Processor::branch`] so that no compiled
    /// code ever runs on the application's stack.
    unsafe fn load_stack_pointer(&mut self, sp: u32) {
        self.stack_pointer = sp;
    }

    unsafe fn branch(&mut self, entry: u32) -> ! {
        // PRIMASK stays set: the application clears it once its runtime is
        // initialised (RTIC does so after `init`).
        // SAFETY: the caller guarantees `entry` is the application's reset
        // handler and the stack pointer its initial MSP.
        unsafe {
            asm!(
                "msr msp, {sp}",
                "isb",
                "bx {entry}",
                sp = in(reg) self.stack_pointer,
                entry = in(reg) entry,
                options(nostack),
            );
        }

        // Not reached: `bx` does not come back.
        loop {
            cortex_m::asm::nop();
        }
    }
}
