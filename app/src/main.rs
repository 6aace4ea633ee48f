#![deny(warnings)]
#![no_main]
#![no_std]

use handoff::mailbox::MAILBOX_ADDR;
use handoff::{BootRequest, Mailbox};
use panic_halt as _;

/// Asks the bootloader to stay in update mode and resets into it.
fn reboot_into_update_mode() -> ! {
    // SAFETY: the word is outside this image's RAM region, nothing else uses it.
    let mut mailbox = unsafe { Mailbox::at(MAILBOX_ADDR as *mut u32) };
    mailbox.post(BootRequest::StayInUpdate);

    cortex_m::asm::dsb();
    cortex_m::peripheral::SCB::sys_reset();
}

#[rtic::app(device = stm32f4xx_hal::pac, peripherals = true)]
mod app {
    use defmt_rtt as _;
    use fugit::MillisDurationU32;
    use stm32f4xx_hal::{
        gpio::{self, Edge, Input, Output, PushPull},
        pac::TIM1,
        prelude::*,
        rcc::Config,
        timer,
    };

    use crate::reboot_into_update_mode;

    const BLINK_ON: MillisDurationU32 = MillisDurationU32::millis(150);
    const BLINK_OFF: MillisDurationU32 = MillisDurationU32::millis(850);

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        button: gpio::PA0<Input>,
        led: gpio::PC13<Output<PushPull>>,
        delay: timer::DelayMs<TIM1>,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local) {
        let mut dp = ctx.device;

        let rcc = dp.RCC.constrain();
        let mut rcc = rcc.freeze(Config::hse(25.MHz()));

        let delay = dp.TIM1.delay_ms(&mut rcc);

        // On-board LED of the Blackpill, active low
        let gpioc = dp.GPIOC.split(&mut rcc);
        let led = gpioc.pc13.into_push_pull_output();

        // KEY button on PA0
        let gpioa = dp.GPIOA.split(&mut rcc);
        let mut button = gpioa.pa0.into_pull_up_input();

        let mut syscfg = dp.SYSCFG.constrain(&mut rcc);
        button.make_interrupt_source(&mut syscfg);
        button.trigger_on_edge(&mut dp.EXTI, Edge::Falling);
        button.enable_interrupt(&mut dp.EXTI);

        defmt::info!("application running, press KEY for update mode");

        (Shared {}, Local { button, led, delay })
    }

    #[idle(local = [led, delay])]
    fn idle(ctx: idle::Context) -> ! {
        let led = ctx.local.led;
        let delay = ctx.local.delay;
        loop {
            led.set_low();
            delay.delay(BLINK_ON);
            led.set_high();
            delay.delay(BLINK_OFF);
        }
    }

    #[task(binds = EXTI0, local = [button])]
    fn key_pressed(ctx: key_pressed::Context) {
        ctx.local.button.clear_interrupt_pending_bit();
        defmt::info!("rebooting into update mode");
        reboot_into_update_mode();
    }
}
